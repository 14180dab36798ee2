//! Session store abstraction shared by the registrar, the tick evaluator and
//! the dispatch guard.
//!
//! Logical layout, per user id:
//! - `sessions/{userId}` holds the [`Session`] record
//! - `schedules/{userId}` holds the [`ScheduleEntry`] anchor
//! - `sessions/{userId}/lastAcknowledgedAt` holds the reminder marker
//!
//! This trait is designed to be mockable using mockall for testing.
//! Use `MockSessionStore` in tests to mock the behavior.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{ScheduleEntry, Session};
use crate::types::UserId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// Result of an atomic attempt to set the reminder marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerClaim {
    /// The marker was unset and now holds the claim timestamp.
    Claimed,
    /// The marker was already set; nothing was written.
    AlreadySet,
    /// The session was replaced by a newer registration since it was read.
    Superseded,
    /// No session exists for the user.
    NoSession,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the session record for a user.
    async fn get_session(&self, user_id: &UserId) -> Result<Option<Session>, StoreError>;

    /// Write the session and its schedule entry together, replacing any
    /// previous session for the same user.
    async fn put_session(&self, session: &Session) -> Result<(), StoreError>;

    /// Enumerate every schedule entry.
    async fn list_schedules(&self) -> Result<Vec<ScheduleEntry>, StoreError>;

    /// Set the marker to `now` only if it is currently unset and the stored
    /// session is still the one that started at `started_at`.
    async fn claim_marker(
        &self,
        user_id: &UserId,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<MarkerClaim, StoreError>;

    /// Unset the marker only if it still holds `claimed_at`.
    /// Returns whether a write happened.
    async fn release_marker(
        &self,
        user_id: &UserId,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}
