use axum::extract::State;
use axum::routing::put;
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::Identity;
use crate::error::AppResult;
use crate::extractors::JsonBody;
use crate::routes::posts::Confirmation;
use crate::state::AppState;
use crate::users::{PublicUser, UserPatch};

#[derive(Debug, Deserialize)]
pub struct UserInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/users/me", put(update_me).delete(delete_me))
}

async fn update_me(
    State(state): State<AppState>,
    identity: Identity,
    JsonBody(input): JsonBody<UserInput>,
) -> AppResult<Json<PublicUser>> {
    let patch = UserPatch {
        username: input.username,
        email: input.email,
        password: input.password,
    };
    let user = state.users.update(&identity.id, patch).await?;
    tracing::info!(user_id = %user.id, "User updated");
    Ok(Json(PublicUser::from(&user)))
}

async fn delete_me(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<Confirmation>> {
    state.users.delete(&identity.id).await?;
    tracing::info!(user_id = %identity.id, "User deleted");
    Ok(Json(Confirmation {
        message: "User deleted successfully".into(),
    }))
}
