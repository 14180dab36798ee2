//! Session registration: creates or refreshes a user's session and its
//! schedule entry.

use std::sync::Arc;

use crate::{
    models::Session,
    repositories::{SessionStore, StoreError},
    types::UserId,
    utils::time::Clock,
};

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("invalid registration: {0}")]
    InvalidInput(&'static str),
    #[error("failed to persist session: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct SessionRegistrar {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionRegistrar {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Start (or restart) the user's session. Any previous session is
    /// replaced and its reminder marker reset.
    pub async fn start_session(
        &self,
        user_id: &UserId,
        session_type: &str,
    ) -> Result<Session, RegistrationError> {
        if user_id.as_str().trim().is_empty() {
            return Err(RegistrationError::InvalidInput("user id is empty"));
        }
        let session_type = session_type.trim();
        if session_type.is_empty() {
            return Err(RegistrationError::InvalidInput("session type is empty"));
        }

        let session = Session::started(user_id.clone(), session_type, self.clock.now());
        self.store.put_session(&session).await.map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "Failed to write session");
            RegistrationError::from(e)
        })?;

        tracing::info!(
            user_id = %user_id,
            session_type,
            started_at = %session.started_at,
            "Session started"
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{session_store::MockSessionStore, MemorySessionStore};
    use crate::utils::time::ManualClock;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    fn uid(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    #[tokio::test]
    async fn start_session_writes_unset_marker_and_schedule() {
        let store = Arc::new(MemorySessionStore::new());
        let registrar = SessionRegistrar::new(store.clone(), Arc::new(ManualClock::new(t0())));

        let session = registrar
            .start_session(&uid("u1"), "standing")
            .await
            .expect("start");

        assert_eq!(session.started_at, t0());
        assert_eq!(session.last_acknowledged_at, None);
        let schedules = store.list_schedules().await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert_eq!(schedules[0].schedule_timestamp, t0());
    }

    #[tokio::test]
    async fn re_registration_resets_the_marker() {
        let store = Arc::new(MemorySessionStore::new());
        let clock = Arc::new(ManualClock::new(t0()));
        let registrar = SessionRegistrar::new(store.clone(), clock.clone());

        registrar.start_session(&uid("u1"), "standing").await.unwrap();
        store
            .claim_marker(&uid("u1"), t0(), t0() + Duration::minutes(26))
            .await
            .unwrap();

        clock.advance(Duration::hours(2));
        registrar.start_session(&uid("u1"), "sitting").await.unwrap();

        let session = store.get_session(&uid("u1")).await.unwrap().unwrap();
        assert_eq!(session.session_type, "sitting");
        assert_eq!(session.last_acknowledged_at, None);
        assert_eq!(session.started_at, t0() + Duration::hours(2));
    }

    #[tokio::test]
    async fn blank_session_type_never_reaches_the_store() {
        let mut store = MockSessionStore::new();
        store.expect_put_session().times(0);
        let registrar = SessionRegistrar::new(Arc::new(store), Arc::new(ManualClock::new(t0())));

        let err = registrar.start_session(&uid("u1"), "   ").await.unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn store_failure_is_reported() {
        let mut store = MockSessionStore::new();
        store
            .expect_put_session()
            .times(1)
            .returning(|_| Err(StoreError::Unavailable("down".into())));
        let registrar = SessionRegistrar::new(Arc::new(store), Arc::new(ManualClock::new(t0())));

        let err = registrar
            .start_session(&uid("u1"), "standing")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Store(_)));
    }
}
