use crate::auth::token::Identity;
use crate::db::StoreError;
use crate::posts::{Post, PostStore};

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Only the author may modify this post")]
    NotAuthor,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Load the post and confirm `identity` wrote it.
///
/// A missing post is reported as not found before ownership is considered.
pub async fn require_author(
    posts: &dyn PostStore,
    post_id: &str,
    identity: &Identity,
) -> Result<Post, AccessError> {
    let post = posts.get_by_id(post_id).await?;
    if post.author != identity.username {
        tracing::warn!(
            post_id = %post_id,
            author = %post.author,
            caller = %identity.username,
            "Rejected modification by non-author"
        );
        return Err(AccessError::NotAuthor);
    }
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::posts::{NewPost, SqlitePostStore};

    fn identity(username: &str) -> Identity {
        Identity {
            id: format!("id-{username}"),
            username: username.to_string(),
        }
    }

    async fn store_with_post() -> (SqlitePostStore, Post) {
        let pool = db::create_memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        let store = SqlitePostStore::new(pool);
        let post = store
            .create(NewPost::new(Some("T".into()), Some("C".into()), "alice"))
            .await
            .unwrap();
        (store, post)
    }

    #[tokio::test]
    async fn author_passes() {
        let (store, post) = store_with_post().await;
        let loaded = require_author(&store, &post.id, &identity("alice"))
            .await
            .unwrap();
        assert_eq!(loaded.id, post.id);
    }

    #[tokio::test]
    async fn other_identity_is_rejected() {
        let (store, post) = store_with_post().await;
        let err = require_author(&store, &post.id, &identity("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotAuthor));
    }

    #[tokio::test]
    async fn missing_post_is_not_found_not_forbidden() {
        let (store, _) = store_with_post().await;
        let err = require_author(&store, "missing", &identity("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Store(StoreError::NotFound(_))));
    }
}
