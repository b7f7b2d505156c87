// User directory - owns user identity records.
// Records are created by the external registration collaborator through `create`;
// this service's routes only read, update and delete them.
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

use crate::auth::hasher::CredentialHasher;
use crate::db::{self, StoreError};
use crate::state::DbPool;
use crate::users::domain::*;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Entry point for the registration collaborator. Hashes the password before storing.
    async fn create(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<User, StoreError>;

    /// Update any subset of username, email and password. Passwords are re-hashed.
    async fn update(&self, id: &str, patch: UserPatch) -> Result<User, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

pub struct SqliteUserDirectory {
    pool: DbPool,
    hasher: Arc<dyn CredentialHasher>,
}

impl SqliteUserDirectory {
    pub fn new(pool: DbPool, hasher: Arc<dyn CredentialHasher>) -> Self {
        Self { pool, hasher }
    }
}

fn find_user(conn: &Connection, id: &str) -> Result<User, StoreError> {
    conn.query_row(
        "SELECT id, username, email, password_hash, created_at FROM users WHERE id = ?1",
        params![id],
        |row| {
            let created_at: String = row.get(4)?;
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                credential_hash: row.get(3)?,
                created_at: db::parse_timestamp(4, &created_at)?,
            })
        },
    )
    .optional()?
    .ok_or(StoreError::NotFound("User"))
}

fn username_taken(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::Conflict("Username is already taken".into())
        }
        other => other.into(),
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn create(&self, user: NewUser) -> Result<User, StoreError> {
        user.validate()?;
        let hasher = self.hasher.clone();

        db::interact(&self.pool, move |conn| {
            let credential_hash = hasher.hash(&user.password)?;
            let id = uuid::Uuid::now_v7().to_string();
            let created_at = db::now();

            conn.execute(
                "INSERT INTO users (id, username, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id,
                    user.username.trim(),
                    user.email.trim(),
                    credential_hash,
                    db::format_timestamp(&created_at)
                ],
            )
            .map_err(username_taken)?;

            Ok(User {
                id,
                username: user.username.trim().to_string(),
                email: user.email.trim().to_string(),
                credential_hash,
                created_at,
            })
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> Result<User, StoreError> {
        let id = id.to_string();
        db::interact(&self.pool, move |conn| find_user(conn, &id)).await
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<User, StoreError> {
        let patch = patch.normalized()?;
        let id = id.to_string();
        let hasher = self.hasher.clone();

        db::interact(&self.pool, move |conn| {
            let credential_hash = patch
                .password
                .as_deref()
                .map(|raw| hasher.hash(raw))
                .transpose()?;

            let tx = conn.transaction()?;
            let changed = tx
                .execute(
                    "UPDATE users
                     SET username = COALESCE(?2, username),
                         email = COALESCE(?3, email),
                         password_hash = COALESCE(?4, password_hash)
                     WHERE id = ?1",
                    params![id, patch.username, patch.email, credential_hash],
                )
                .map_err(username_taken)?;
            if changed == 0 {
                return Err(StoreError::NotFound("User"));
            }
            let user = find_user(&tx, &id)?;
            tx.commit()?;
            Ok(user)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        db::interact(&self.pool, move |conn| {
            let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(StoreError::NotFound("User"));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hasher::BcryptHasher;

    fn directory() -> SqliteUserDirectory {
        let pool = db::create_memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        SqliteUserDirectory::new(pool, Arc::new(BcryptHasher::new(4)))
    }

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: format!("{username}@example.com"),
            password: "hunter2".into(),
        }
    }

    #[tokio::test]
    async fn create_hashes_password() {
        let dir = directory();
        let user = dir.create(new_user("alice")).await.unwrap();
        assert_ne!(user.credential_hash, "hunter2");
        assert!(dir.hasher.verify("hunter2", &user.credential_hash).unwrap());

        let found = dir.find_by_id(&user.id).await.unwrap();
        assert_eq!(found, user);
    }

    #[tokio::test]
    async fn duplicate_username_is_conflict() {
        let dir = directory();
        dir.create(new_user("alice")).await.unwrap();
        let err = dir.create(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn find_missing_user_is_not_found() {
        let dir = directory();
        let err = dir.find_by_id("nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("User")));
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let dir = directory();
        let user = dir.create(new_user("alice")).await.unwrap();

        let updated = dir
            .update(
                &user.id,
                UserPatch {
                    email: Some("new@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.username, "alice");
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.credential_hash, user.credential_hash);
    }

    #[tokio::test]
    async fn update_rehashes_password() {
        let dir = directory();
        let user = dir.create(new_user("alice")).await.unwrap();

        let updated = dir
            .update(
                &user.id,
                UserPatch {
                    password: Some("correct horse".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_ne!(updated.credential_hash, "correct horse");
        assert_ne!(updated.credential_hash, user.credential_hash);
        assert!(dir
            .hasher
            .verify("correct horse", &updated.credential_hash)
            .unwrap());
    }

    #[tokio::test]
    async fn update_to_taken_username_is_conflict() {
        let dir = directory();
        dir.create(new_user("alice")).await.unwrap();
        let bob = dir.create(new_user("bob")).await.unwrap();

        let err = dir
            .update(
                &bob.id,
                UserPatch {
                    username: Some("alice".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_with_nothing_is_validation_error() {
        let dir = directory();
        let user = dir.create(new_user("alice")).await.unwrap();
        let err = dir.update(&user.id, UserPatch::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let dir = directory();
        let patch = UserPatch {
            email: Some("x@example.com".into()),
            ..Default::default()
        };
        let err = dir.update("nope", patch).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_then_find_is_not_found() {
        let dir = directory();
        let user = dir.create(new_user("alice")).await.unwrap();
        dir.delete(&user.id).await.unwrap();

        assert!(matches!(
            dir.find_by_id(&user.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            dir.delete(&user.id).await.unwrap_err(),
            StoreError::NotFound(_)
        ));
    }
}
