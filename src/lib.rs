// Library exports for VerseVault
// This allows integration tests and the binary to share one module tree

pub mod auth;
pub mod blobs;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod posts;
pub mod routes;
pub mod state;
pub mod users;
