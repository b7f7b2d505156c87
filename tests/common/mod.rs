#![allow(dead_code)]

use reqwest::{Client, RequestBuilder};
use tempfile::TempDir;

use versevault::auth::Identity;
use versevault::config::Config;
use versevault::state::AppState;
use versevault::users::{NewUser, User};
use versevault::{db, routes};

pub const SECRET: &str = "integration-test-secret";

/// A running server on an ephemeral port, backed by a temporary data directory.
pub struct TestApp {
    pub base_url: String,
    pub state: AppState,
    pub client: Client,
    pub data_dir: TempDir,
}

pub async fn spawn_app() -> TestApp {
    let data_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.database.path = Some(data_dir.path().join("test.db"));
    config.storage.path = Some(data_dir.path().join("uploads"));
    config.auth.jwt_secret = SECRET.to_string();
    config.auth.bcrypt_cost = 4;
    config.validate().unwrap();
    std::fs::create_dir_all(config.uploads_path()).unwrap();

    let pool = db::create_pool(&config.db_path()).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");

    let state = AppState::new(config, pool);
    let app = routes::app(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        state,
        client: Client::new(),
        data_dir,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Credential for a username that has no directory record.
    pub fn token_for(&self, username: &str) -> String {
        self.state
            .tokens
            .issue(&Identity {
                id: format!("id-{username}"),
                username: username.to_string(),
            })
            .unwrap()
    }

    /// Register a user in the directory and mint a credential for them.
    pub async fn register(&self, username: &str) -> (User, String) {
        let user = self
            .state
            .users
            .create(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password: "hunter2".to_string(),
            })
            .await
            .unwrap();
        let token = self
            .state
            .tokens
            .issue(&Identity {
                id: user.id.clone(),
                username: user.username.clone(),
            })
            .unwrap();
        (user, token)
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.client.get(self.url(path))
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.client.post(self.url(path))
    }

    pub fn put(&self, path: &str) -> RequestBuilder {
        self.client.put(self.url(path))
    }

    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.client.delete(self.url(path))
    }
}
