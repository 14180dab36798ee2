//! In-memory session store used for local runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::session_store::{MarkerClaim, SessionStore, StoreError};
use crate::models::{ScheduleEntry, Session};
use crate::types::UserId;

#[derive(Default)]
struct Tables {
    sessions: HashMap<UserId, Session>,
    schedules: HashMap<UserId, ScheduleEntry>,
}

/// Sessions and schedules kept behind a single lock so that the paired write
/// in `put_session` and the marker check-and-set are both atomic.
#[derive(Default)]
pub struct MemorySessionStore {
    tables: RwLock<Tables>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_session(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        Ok(self.tables.read().await.sessions.get(user_id).cloned())
    }

    async fn put_session(&self, session: &Session) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .sessions
            .insert(session.user_id.clone(), session.clone());
        tables
            .schedules
            .insert(session.user_id.clone(), session.schedule_entry());
        Ok(())
    }

    async fn list_schedules(&self) -> Result<Vec<ScheduleEntry>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .schedules
            .values()
            .cloned()
            .collect())
    }

    async fn claim_marker(
        &self,
        user_id: &UserId,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<MarkerClaim, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(session) = tables.sessions.get_mut(user_id) else {
            return Ok(MarkerClaim::NoSession);
        };
        if session.started_at != started_at {
            return Ok(MarkerClaim::Superseded);
        }
        if session.last_acknowledged_at.is_some() {
            return Ok(MarkerClaim::AlreadySet);
        }
        session.last_acknowledged_at = Some(now);
        Ok(MarkerClaim::Claimed)
    }

    async fn release_marker(
        &self,
        user_id: &UserId,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.sessions.get_mut(user_id) {
            Some(session) if session.last_acknowledged_at == Some(claimed_at) => {
                session.last_acknowledged_at = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
