use std::sync::Arc;

use chrono::Duration;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::hasher::BcryptHasher;
use crate::auth::token::TokenKeys;
use crate::blobs::{BlobStore, LocalBlobStore};
use crate::config::Config;
use crate::posts::{PostStore, SqlitePostStore};
use crate::users::{SqliteUserDirectory, UserDirectory};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub tokens: Arc<TokenKeys>,
    pub posts: Arc<dyn PostStore>,
    pub users: Arc<dyn UserDirectory>,
    pub blobs: Arc<dyn BlobStore>,
}

impl AppState {
    /// Wire the SQLite-backed stores, bcrypt hasher and local blob store from config.
    pub fn new(config: Config, db: DbPool) -> Self {
        let tokens = TokenKeys::new(
            &config.auth.jwt_secret,
            Duration::hours(config.auth.token_hours),
        );
        let hasher = Arc::new(BcryptHasher::new(config.auth.bcrypt_cost));
        let blobs = LocalBlobStore::new(config.uploads_path(), config.storage.public_base.clone());

        Self {
            tokens: Arc::new(tokens),
            posts: Arc::new(SqlitePostStore::new(db.clone())),
            users: Arc::new(SqliteUserDirectory::new(db, hasher)),
            blobs: Arc::new(blobs),
            config,
        }
    }
}
