use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::StoreError;

/// Stored user record. Deliberately not `Serialize`: responses go through [`PublicUser`].
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub credential_hash: String,
    pub created_at: DateTime<Utc>,
}

/// User as shown to clients, without the credential hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.username.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
        {
            return Err(StoreError::Validation(
                "Username, email and password are required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserPatch {
    pub fn normalized(self) -> Result<Self, StoreError> {
        let trimmed = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let patch = Self {
            username: trimmed(self.username),
            email: trimmed(self.email),
            password: self.password.filter(|p| !p.is_empty()),
        };

        if patch.username.is_none() && patch.email.is_none() && patch.password.is_none() {
            return Err(StoreError::Validation("Nothing to update".into()));
        }
        Ok(patch)
    }
}
