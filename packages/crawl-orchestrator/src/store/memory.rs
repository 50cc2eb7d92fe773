//! In-memory session storage for testing and ephemeral runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use super::SessionRepository;
use crate::error::StoreError;
use crate::session::{CrawlSession, NewSession, SessionId};

/// In-memory session rows.
///
/// Data is lost on restart.
#[derive(Default)]
pub struct MemorySessionRepository {
    rows: RwLock<BTreeMap<SessionId, CrawlSession>>,
    next_id: AtomicI64,
}

impl MemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepository {
    async fn insert(&self, session: &NewSession) -> Result<SessionId, StoreError> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.rows
            .write()
            .unwrap()
            .insert(id, CrawlSession::pending(id, session.clone()));
        Ok(id)
    }

    async fn save(&self, session: &CrawlSession) -> Result<(), StoreError> {
        let mut rows = self.rows.write().unwrap();
        match rows.get_mut(&session.id) {
            Some(row) => {
                *row = session.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(session.id)),
        }
    }

    async fn load_all(&self) -> Result<Vec<CrawlSession>, StoreError> {
        Ok(self.rows.read().unwrap().values().cloned().collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.rows.write().unwrap().clear();
        Ok(())
    }
}
