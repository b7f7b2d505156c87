//! Bearer credential verification.
//!
//! Credentials are HS256 JSON Web Tokens carrying the user id as `sub` and the
//! username as a private claim. Verification is a pure function of the token and
//! the shared secret.
//!
//! Registration and login live outside this service. Whatever front door signs users
//! in mints credentials through [`TokenKeys::issue`] with the same secret.

use axum::http::HeaderValue;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Verified claims of the caller, passed explicitly from the gate to handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    username: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("Access token is missing or invalid")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Pull `<token>` out of an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&HeaderValue>) -> Result<&str, VerificationError> {
    let value = header
        .and_then(|h| h.to_str().ok())
        .ok_or(VerificationError::MissingToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(VerificationError::MissingToken)?;

    if token.is_empty() {
        return Err(VerificationError::MissingToken);
    }
    Ok(token)
}

/// Check signature and expiry of `token` against `secret`.
pub fn verify(token: &str, secret: &str) -> Result<Identity, VerificationError> {
    decode_identity(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
}

fn decode_identity(
    token: &str,
    key: &DecodingKey,
    validation: &Validation,
) -> Result<Identity, VerificationError> {
    let data = decode::<Claims>(token, key, validation)?;
    Ok(Identity {
        id: data.claims.sub,
        username: data.claims.username,
    })
}

/// Keys derived once from the configured secret.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl,
        }
    }

    /// Mint a credential for `identity`, valid for the configured lifetime.
    /// Called by the external sign-in collaborator; the routes here only verify.
    pub fn issue(&self, identity: &Identity) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.id.clone(),
            username: identity.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    pub fn verify(&self, token: &str) -> Result<Identity, VerificationError> {
        decode_identity(token, &self.decoding, &self.validation)
    }
}
