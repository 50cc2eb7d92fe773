//! Local persistence of crawl sessions.
//!
//! Available backends:
//! - `MemorySessionRepository` - In-memory storage (tests, ephemeral runs)
//! - `SqliteSessionRepository` - SQLite file-based storage
//!
//! `SessionStore` sits in front of a backend and owns the in-memory index
//! that observers watch.

pub mod memory;
pub mod session_store;
pub mod sqlite;

pub use memory::MemorySessionRepository;
pub use session_store::SessionStore;
pub use sqlite::SqliteSessionRepository;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::session::{CrawlSession, NewSession, SessionId};

/// Durable backend for crawl sessions. Only `SessionStore` calls this.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new row and return its assigned id. Ids are never reused,
    /// not even after `clear`.
    async fn insert(&self, session: &NewSession) -> Result<SessionId, StoreError>;

    /// Overwrite the mutable columns of an existing row.
    async fn save(&self, session: &CrawlSession) -> Result<(), StoreError>;

    async fn load_all(&self) -> Result<Vec<CrawlSession>, StoreError>;

    async fn clear(&self) -> Result<(), StoreError>;
}
