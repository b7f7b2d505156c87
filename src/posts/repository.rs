// Post store - owns posts and their embedded comments and likers
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{self, StoreError};
use crate::posts::domain::*;
use crate::state::DbPool;

#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Post, StoreError>;

    /// Every post, newest first.
    async fn list_all(&self) -> Result<Vec<Post>, StoreError>;

    /// Posts whose author is exactly `username`, newest first.
    async fn list_by_author(&self, username: &str) -> Result<Vec<Post>, StoreError>;

    /// Posts whose title, content or author contains `query`, newest first.
    async fn search(&self, query: &str) -> Result<Vec<Post>, StoreError>;

    /// Apply a partial update. Ownership is the caller's responsibility.
    async fn update(&self, id: &str, patch: PostPatch) -> Result<Post, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Add one like and record `username` among the likers. Returns the new count.
    async fn increment_likes(&self, id: &str, username: &str) -> Result<i64, StoreError>;

    /// Append a comment and return the post's full comment sequence.
    async fn append_comment(
        &self,
        id: &str,
        username: &str,
        comment: &str,
    ) -> Result<Vec<Comment>, StoreError>;
}

pub struct SqlitePostStore {
    pool: DbPool,
}

impl SqlitePostStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, title, content, author, image_url, likes, created_at";

// rowid breaks ties between posts created within the same microsecond
const NEWEST_FIRST: &str = "ORDER BY created_at DESC, rowid DESC";

fn read_post(row: &Row<'_>) -> rusqlite::Result<Post> {
    let created_at: String = row.get(6)?;
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        author: row.get(3)?,
        image_url: row.get(4)?,
        likes: row.get(5)?,
        created_at: db::parse_timestamp(6, &created_at)?,
        liked_by: Vec::new(),
        comments: Vec::new(),
    })
}

fn load_comments(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<Comment>> {
    let mut stmt = conn.prepare_cached(
        "SELECT username, comment, created_at FROM comments WHERE post_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![post_id], |row| {
        let created_at: String = row.get(2)?;
        Ok(Comment {
            username: row.get(0)?,
            comment: row.get(1)?,
            created_at: db::parse_timestamp(2, &created_at)?,
        })
    })?;
    rows.collect()
}

fn load_likers(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT username FROM post_likes WHERE post_id = ?1 ORDER BY liked_at ASC, username ASC",
    )?;
    let rows = stmt.query_map(params![post_id], |row| row.get(0))?;
    rows.collect()
}

fn hydrate(conn: &Connection, mut post: Post) -> rusqlite::Result<Post> {
    post.comments = load_comments(conn, &post.id)?;
    post.liked_by = load_likers(conn, &post.id)?;
    Ok(post)
}

fn find_post(conn: &Connection, id: &str) -> Result<Post, StoreError> {
    let post = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            params![id],
            read_post,
        )
        .optional()?
        .ok_or(StoreError::NotFound("Post"))?;
    Ok(hydrate(conn, post)?)
}

fn query_posts<P: rusqlite::Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> Result<Vec<Post>, StoreError> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts {filter} {NEWEST_FIRST}");
    let mut stmt = conn.prepare_cached(&sql)?;
    let posts = stmt
        .query_map(params, read_post)?
        .collect::<Result<Vec<_>, _>>()?;

    posts
        .into_iter()
        .map(|post| hydrate(conn, post).map_err(StoreError::from))
        .collect()
}

fn post_exists(conn: &Connection, id: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM posts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

#[async_trait]
impl PostStore for SqlitePostStore {
    async fn create(&self, post: NewPost) -> Result<Post, StoreError> {
        post.validate()?;

        db::interact(&self.pool, move |conn| {
            let id = uuid::Uuid::now_v7().to_string();
            let created_at = db::now();

            conn.execute(
                "INSERT INTO posts (id, title, content, author, image_url, likes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    id,
                    post.title,
                    post.content,
                    post.author,
                    post.image_url,
                    db::format_timestamp(&created_at)
                ],
            )?;

            Ok(Post {
                id,
                title: post.title,
                content: post.content,
                author: post.author,
                created_at,
                likes: 0,
                liked_by: Vec::new(),
                comments: Vec::new(),
                image_url: post.image_url,
            })
        })
        .await
    }

    async fn get_by_id(&self, id: &str) -> Result<Post, StoreError> {
        let id = id.to_string();
        db::interact(&self.pool, move |conn| find_post(conn, &id)).await
    }

    async fn list_all(&self) -> Result<Vec<Post>, StoreError> {
        db::interact(&self.pool, |conn| query_posts(conn, "", params![])).await
    }

    async fn list_by_author(&self, username: &str) -> Result<Vec<Post>, StoreError> {
        let username = username.to_string();
        db::interact(&self.pool, move |conn| {
            query_posts(conn, "WHERE author = ?1", params![username])
        })
        .await
    }

    async fn search(&self, query: &str) -> Result<Vec<Post>, StoreError> {
        let needle = search_needle(query)?;
        db::interact(&self.pool, move |conn| {
            query_posts(
                conn,
                "WHERE instr(fold(title), ?1) > 0
                    OR instr(fold(content), ?1) > 0
                    OR instr(fold(author), ?1) > 0",
                params![needle],
            )
        })
        .await
    }

    async fn update(&self, id: &str, patch: PostPatch) -> Result<Post, StoreError> {
        let patch = patch.normalized()?;
        let id = id.to_string();

        db::interact(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE posts
                 SET title = COALESCE(?2, title), content = COALESCE(?3, content)
                 WHERE id = ?1",
                params![id, patch.title, patch.content],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound("Post"));
            }
            let post = find_post(&tx, &id)?;
            tx.commit()?;
            Ok(post)
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        db::interact(&self.pool, move |conn| {
            let deleted = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(StoreError::NotFound("Post"));
            }
            Ok(())
        })
        .await
    }

    async fn increment_likes(&self, id: &str, username: &str) -> Result<i64, StoreError> {
        let id = id.to_string();
        let username = username.to_string();

        db::interact(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            let likes: i64 = tx
                .query_row(
                    "UPDATE posts SET likes = likes + 1 WHERE id = ?1 RETURNING likes",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or(StoreError::NotFound("Post"))?;

            tx.execute(
                "INSERT OR IGNORE INTO post_likes (post_id, username, liked_at) VALUES (?1, ?2, ?3)",
                params![id, username, db::format_timestamp(&db::now())],
            )?;
            tx.commit()?;
            Ok(likes)
        })
        .await
    }

    async fn append_comment(
        &self,
        id: &str,
        username: &str,
        comment: &str,
    ) -> Result<Vec<Comment>, StoreError> {
        let text = comment_text(comment)?.to_string();
        let id = id.to_string();
        let username = username.to_string();

        db::interact(&self.pool, move |conn| {
            let tx = conn.transaction()?;
            if !post_exists(&tx, &id)? {
                return Err(StoreError::NotFound("Post"));
            }
            tx.execute(
                "INSERT INTO comments (post_id, username, comment, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, username, text, db::format_timestamp(&db::now())],
            )?;
            let comments = load_comments(&tx, &id)?;
            tx.commit()?;
            Ok(comments)
        })
        .await
    }
}
