//! Models for exercise sessions and the schedule index the tick scans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
/// A user's active reminder cycle. Re-registration overwrites it.
pub struct Session {
    /// Owner of the session; at most one session exists per user.
    pub user_id: UserId,
    /// Free-form label chosen when the session was started.
    pub session_type: String,
    /// Registration time.
    pub started_at: DateTime<Utc>,
    /// Time the reminder for this session was sent; `None` until then.
    pub last_acknowledged_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A freshly registered session with the reminder marker unset.
    pub fn started(user_id: UserId, session_type: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            session_type: session_type.into(),
            started_at: now,
            last_acknowledged_at: None,
        }
    }

    pub fn is_acknowledged(&self) -> bool {
        self.last_acknowledged_at.is_some()
    }

    /// Schedule entry written alongside this session.
    pub fn schedule_entry(&self) -> ScheduleEntry {
        ScheduleEntry {
            user_id: self.user_id.clone(),
            schedule_timestamp: self.started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
/// Secondary index row enumerated on every tick.
pub struct ScheduleEntry {
    pub user_id: UserId,
    /// Anchor for the elapsed-time check; mirrors `Session::started_at`.
    pub schedule_timestamp: DateTime<Utc>,
}

impl ScheduleEntry {
    pub fn elapsed(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.schedule_timestamp
    }
}
