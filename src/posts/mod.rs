pub mod domain;
pub mod repository;

pub use domain::{Comment, NewPost, Post, PostPatch};
pub use repository::{PostStore, SqlitePostStore};
