//! PostgreSQL-backed session store.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::PgPool;

use super::session_store::{MarkerClaim, SessionStore, StoreError};
use super::transaction::{begin_transaction, commit_transaction};
use crate::models::{ScheduleEntry, Session};
use crate::types::UserId;

/// Postgres keeps microsecond precision; markers are compared for equality
/// on release, so every timestamp written here is truncated first.
fn db_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_started_at(
        &self,
        user_id: &UserId,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let started_at =
            sqlx::query_scalar("SELECT started_at FROM sessions WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(started_at)
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get_session(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT user_id, session_type, started_at, last_acknowledged_at
            FROM sessions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn put_session(&self, session: &Session) -> Result<(), StoreError> {
        let started_at = db_timestamp(session.started_at);
        let mut tx = begin_transaction(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO sessions (user_id, session_type, started_at, last_acknowledged_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET session_type = EXCLUDED.session_type,
                started_at = EXCLUDED.started_at,
                last_acknowledged_at = EXCLUDED.last_acknowledged_at
            "#,
        )
        .bind(&session.user_id)
        .bind(&session.session_type)
        .bind(started_at)
        .bind(session.last_acknowledged_at.map(db_timestamp))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO schedules (user_id, schedule_timestamp)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE
            SET schedule_timestamp = EXCLUDED.schedule_timestamp
            "#,
        )
        .bind(&session.user_id)
        .bind(started_at)
        .execute(&mut *tx)
        .await?;

        commit_transaction(tx).await
    }

    async fn list_schedules(&self) -> Result<Vec<ScheduleEntry>, StoreError> {
        let entries = sqlx::query_as::<_, ScheduleEntry>(
            "SELECT user_id, schedule_timestamp FROM schedules",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn claim_marker(
        &self,
        user_id: &UserId,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<MarkerClaim, StoreError> {
        let started_at = db_timestamp(started_at);
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET last_acknowledged_at = $1
            WHERE user_id = $2 AND started_at = $3 AND last_acknowledged_at IS NULL
            "#,
        )
        .bind(db_timestamp(now))
        .bind(user_id)
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(MarkerClaim::Claimed);
        }
        match self.current_started_at(user_id).await? {
            None => Ok(MarkerClaim::NoSession),
            Some(current) if current != started_at => Ok(MarkerClaim::Superseded),
            Some(_) => Ok(MarkerClaim::AlreadySet),
        }
    }

    async fn release_marker(
        &self,
        user_id: &UserId,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET last_acknowledged_at = NULL
            WHERE user_id = $1 AND last_acknowledged_at = $2
            "#,
        )
        .bind(user_id)
        .bind(db_timestamp(claimed_at))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn db_timestamp_drops_sub_microsecond_precision() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let truncated = db_timestamp(ts);
        assert_eq!(truncated.timestamp_subsec_nanos(), 123_456_000);
    }
}
