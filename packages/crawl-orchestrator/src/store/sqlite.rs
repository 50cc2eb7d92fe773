//! SQLite session storage.
//!
//! The durable local mirror of crawl jobs. One row per submitted job.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;

use super::SessionRepository;
use crate::error::StoreError;
use crate::session::{CrawlSession, JobIdentity, NewSession, RemoteId, SessionId};
use crate::status::SessionStatus;

/// SQLite-backed session repository.
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    /// Open (and migrate) a SQLite database.
    ///
    /// # Example URLs
    /// - `sqlite://crawl_sessions.db?mode=rwc` - File-based, created if missing
    /// - `sqlite::memory:` - In-memory database (use [`Self::in_memory`])
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Self::with_pool(pool).await
    }

    /// An in-memory database. Pinned to a single long-lived connection, since
    /// every SQLite connection to `:memory:` is its own database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let repository = Self { pool };
        repository.run_migrations().await?;
        Ok(repository)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_id TEXT,
                start_url TEXT NOT NULL,
                depth INTEGER NOT NULL,
                status TEXT NOT NULL,
                status_detail TEXT,
                status_version INTEGER NOT NULL DEFAULT 0,
                start_time TEXT NOT NULL,
                end_time TEXT,
                pages_crawled INTEGER NOT NULL DEFAULT 0,
                pages_total INTEGER NOT NULL DEFAULT 0,
                pages_queued INTEGER NOT NULL DEFAULT 0,
                current_url TEXT,
                output_path TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_crawl_sessions_start_time ON crawl_sessions(start_time);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: i64,
    remote_id: Option<String>,
    start_url: String,
    depth: i64,
    status: String,
    status_detail: Option<String>,
    status_version: i64,
    start_time: String,
    end_time: Option<String>,
    pages_crawled: i64,
    pages_total: i64,
    pages_queued: i64,
    current_url: Option<String>,
    output_path: String,
}

impl SessionRow {
    fn into_session(self) -> Result<CrawlSession, StoreError> {
        let id = self.id;
        let corrupt = |reason: String| StoreError::Corrupt { id, reason };

        let status = SessionStatus::from_parts(&self.status, self.status_detail)
            .ok_or_else(|| corrupt(format!("unknown status {}", self.status)))?;
        let start_time = parse_time(&self.start_time).map_err(corrupt)?;
        let end_time = self
            .end_time
            .as_deref()
            .map(parse_time)
            .transpose()
            .map_err(corrupt)?;
        let identity = match self.remote_id {
            Some(remote_id) => JobIdentity::Submitted(RemoteId::new(remote_id)),
            None => JobIdentity::Unsubmitted,
        };

        Ok(CrawlSession {
            id: SessionId(self.id),
            identity,
            start_url: self.start_url,
            depth: u32::try_from(self.depth).map_err(|e| corrupt(format!("depth: {e}")))?,
            status,
            status_version: to_u64(self.status_version),
            start_time,
            end_time,
            pages_crawled: to_u64(self.pages_crawled),
            pages_total: to_u64(self.pages_total),
            pages_queued: to_u64(self.pages_queued),
            current_url: self.current_url,
            output_path: self.output_path.into(),
        })
    }
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid date {raw}: {e}"))
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl SessionRepository for SqliteSessionRepository {
    async fn insert(&self, session: &NewSession) -> Result<SessionId, StoreError> {
        let status = SessionStatus::Pending;
        let result = sqlx::query(
            r#"
            INSERT INTO crawl_sessions (start_url, depth, status, start_time, output_path)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.start_url)
        .bind(i64::from(session.depth))
        .bind(status.label())
        .bind(session.start_time.to_rfc3339())
        .bind(session.output_path.to_string_lossy().into_owned())
        .execute(&self.pool)
        .await?;

        Ok(SessionId(result.last_insert_rowid()))
    }

    async fn save(&self, session: &CrawlSession) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE crawl_sessions
            SET remote_id = ?,
                status = ?,
                status_detail = ?,
                status_version = ?,
                end_time = ?,
                pages_crawled = ?,
                pages_total = ?,
                pages_queued = ?,
                current_url = ?
            WHERE id = ?
            "#,
        )
        .bind(session.remote_id().map(|id| id.as_str().to_string()))
        .bind(session.status.label())
        .bind(session.status.detail().map(str::to_string))
        .bind(to_i64(session.status_version))
        .bind(session.end_time.map(|t| t.to_rfc3339()))
        .bind(to_i64(session.pages_crawled))
        .bind(to_i64(session.pages_total))
        .bind(to_i64(session.pages_queued))
        .bind(session.current_url.as_deref())
        .bind(session.id.as_i64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(session.id));
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<CrawlSession>, StoreError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, remote_id, start_url, depth, status, status_detail, status_version,
                   start_time, end_time, pages_crawled, pages_total, pages_queued,
                   current_url, output_path
            FROM crawl_sessions
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SessionRow::into_session).collect()
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM crawl_sessions")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session(url: &str) -> NewSession {
        NewSession {
            start_url: url.to_string(),
            depth: 2,
            output_path: "/out".into(),
            start_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_load_roundtrip() {
        let repo = SqliteSessionRepository::in_memory().await.unwrap();

        let first = repo.insert(&new_session("https://example.com")).await.unwrap();
        let second = repo.insert(&new_session("https://example.org")).await.unwrap();
        assert!(second > first);

        let sessions = repo.load_all().await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].status, SessionStatus::Pending);
        assert_eq!(sessions[0].identity, JobIdentity::Unsubmitted);
        assert_eq!(sessions[0].output_path, std::path::PathBuf::from("/out"));
    }

    #[tokio::test]
    async fn test_save_persists_status_detail_and_remote_id() {
        let repo = SqliteSessionRepository::in_memory().await.unwrap();
        let id = repo.insert(&new_session("https://example.com")).await.unwrap();

        let mut session = repo.load_all().await.unwrap().remove(0);
        session.identity = JobIdentity::Submitted(RemoteId::new("abc123"));
        session.apply_status(SessionStatus::Error("connection reset".into()), Utc::now());
        session.pages_crawled = 7;
        session.current_url = Some("https://example.com/a".into());
        repo.save(&session).await.unwrap();

        let loaded = repo.load_all().await.unwrap().remove(0);
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.remote_id(), Some(&RemoteId::new("abc123")));
        assert_eq!(loaded.status, SessionStatus::Error("connection reset".into()));
        assert_eq!(loaded.status_version, 1);
        assert!(loaded.end_time.is_some());
        assert_eq!(loaded.pages_crawled, 7);
        assert_eq!(loaded.current_url.as_deref(), Some("https://example.com/a"));
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_clear() {
        let repo = SqliteSessionRepository::in_memory().await.unwrap();
        let first = repo.insert(&new_session("https://example.com")).await.unwrap();

        repo.clear().await.unwrap();
        assert!(repo.load_all().await.unwrap().is_empty());

        let next = repo.insert(&new_session("https://example.com")).await.unwrap();
        assert!(next > first);
    }
}
