use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::auth::hasher::HashError;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Failures surfaced by the post store and the user directory.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// File-backed pool. The parent directory is created on demand.
pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        configure_connection(conn)
    });
    Ok(Pool::builder().max_size(8).build(manager)?)
}

/// Single-connection in-memory pool. Every connection to `:memory:` is its own
/// database, so the pool must never grow past one.
pub fn create_memory_pool() -> anyhow::Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(configure_connection);
    Ok(Pool::builder().max_size(1).build(manager)?)
}

// foreign_keys is what makes comment and like rows follow their post
fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    register_fold(conn)
}

/// `fold(text)`: Unicode lowercase, for case-insensitive matching beyond ASCII.
/// Built-in `LIKE` and `lower()` only fold A-Z.
fn register_fold(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )
}

/// Apply every entry of [`MIGRATIONS`] not yet recorded, each in its own transaction.
pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let mut applied = 0;
    for &(name, sql) in MIGRATIONS {
        let tx = conn.transaction()?;
        let known = tx
            .query_row(
                "SELECT 1 FROM schema_version WHERE name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if known {
            continue;
        }

        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_version (name, applied_at) VALUES (?1, ?2)",
            params![name, format_timestamp(&now())],
        )?;
        tx.commit()?;
        tracing::info!(migration = name, "Applied migration");
        applied += 1;
    }

    tracing::debug!(applied, total = MIGRATIONS.len(), "Schema up to date");
    Ok(())
}

/// Run blocking SQLite work off the async executor.
pub async fn interact<F, T>(pool: &DbPool, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

/// Current time truncated to the precision that survives a round trip through the store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

// Fixed-width RFC 3339 so that text ordering matches chronological ordering.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());
        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn every_pooled_connection_enforces_foreign_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let pool = create_pool(&tmp.path().join("fk.db")).unwrap();
        let first = pool.get().unwrap();
        let second = pool.get().unwrap();
        for conn in [&first, &second] {
            let enabled: bool = conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                .unwrap();
            assert!(enabled);
        }
    }

    #[test]
    fn migrations_run_successfully() {
        let pool = create_memory_pool().unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"posts".to_string()));
        assert!(tables.contains(&"comments".to_string()));
        assert!(tables.contains(&"post_likes".to_string()));
    }

    #[test]
    fn migrations_are_idempotent() {
        let pool = create_memory_pool().unwrap();
        run_migrations(&pool).unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn comments_require_an_existing_post() {
        let pool = create_memory_pool().unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO comments (post_id, username, comment, created_at) VALUES (?1, ?2, ?3, ?4)",
            params!["missing-post", "carol", "nice", "2025-01-15T12:00:00.000000Z"],
        );
        assert!(result.is_err());
    }

    #[test]
    fn likes_cannot_go_negative() {
        let pool = create_memory_pool().unwrap();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO posts (id, title, content, author, likes, created_at)
             VALUES ('p1', 'T', 'C', 'alice', -1, '2025-01-15T12:00:00.000000Z')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn timestamps_sort_chronologically_as_text() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let later = earlier + chrono::Duration::microseconds(1500);
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
        assert_eq!(format_timestamp(&earlier), "2025-01-15T12:00:00.000000Z");
    }

    #[test]
    fn parse_timestamp_round_trips_stored_format() {
        let dt = now();
        let parsed = parse_timestamp(0, &format_timestamp(&dt)).unwrap();
        assert_eq!(parsed, dt);
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp(3, "not-a-date").is_err());
    }

    #[tokio::test]
    async fn interact_runs_closure_on_pooled_connection() {
        let pool = create_memory_pool().unwrap();
        let answer: i64 = interact(&pool, |conn| {
            Ok(conn.query_row("SELECT 40 + 2", [], |row| row.get(0))?)
        })
        .await
        .unwrap();
        assert_eq!(answer, 42);
    }
}
