use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header;
use axum::http::request::Parts;
use axum::Json;

use crate::auth::token::{self, Identity};
use crate::error::AppError;
use crate::state::AppState;

/// Extractor that requires a valid bearer credential.
/// Missing credential is 401, an invalid or expired one is 403.
impl FromRequestParts<AppState> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token::bearer_token(parts.headers.get(header::AUTHORIZATION))?;

        state.tokens.verify(token).map_err(|e| {
            tracing::warn!("Rejected bearer credential: {}", e);
            AppError::from(e)
        })
    }
}

/// JSON body whose rejections surface as validation errors in the usual error shape.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(JsonBody(value))
    }
}
