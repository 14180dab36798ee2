//! Periodic reminder evaluation and dispatch.
//!
//! Every tick the [`TickEvaluator`] scans the schedule index for sessions whose
//! elapsed time reached the reminder interval. Each candidate goes through the
//! [`DispatchGuard`], which claims the session's marker with an atomic
//! compare-and-set before sending, so overlapping ticks cannot both deliver.
//! A session fires once per lifetime; re-registration clears the marker.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::{
    models::Notification,
    repositories::{MarkerClaim, SessionStore, StoreError},
    services::notifier::{Notifier, SendError},
    types::UserId,
    utils::time::Clock,
};

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("session store failure: {0}")]
    Store(#[from] StoreError),
    #[error("no session for user {0}")]
    SessionNotFound(UserId),
    #[error("no device token registered for user {0}")]
    MissingDeviceToken(UserId),
    #[error("notification delivery failed: {0}")]
    Send(#[from] SendError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireOutcome {
    Fired,
    AlreadyFired,
    /// The user registered a new session after this one was read.
    Superseded,
}

/// Selects sessions whose elapsed time since scheduling reached the interval.
#[derive(Clone)]
pub struct TickEvaluator {
    store: Arc<dyn SessionStore>,
    interval: Duration,
}

impl TickEvaluator {
    pub fn new(store: Arc<dyn SessionStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Full scan of the schedule index. Keeps no state between ticks: a
    /// session stays a candidate until the guard's marker is set.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> Result<Vec<UserId>, StoreError> {
        let entries = self.store.list_schedules().await?;
        let total = entries.len();
        let candidates: Vec<UserId> = entries
            .into_iter()
            .filter(|entry| entry.elapsed(now) >= self.interval)
            .map(|entry| entry.user_id)
            .collect();

        tracing::debug!(
            scanned = total,
            candidates = candidates.len(),
            %now,
            "Evaluated reminder schedules"
        );
        Ok(candidates)
    }
}

/// Sends at most one reminder per session.
#[derive(Clone)]
pub struct DispatchGuard {
    store: Arc<dyn SessionStore>,
    notifier: Arc<dyn Notifier>,
    interval_minutes: i64,
}

impl DispatchGuard {
    pub fn new(
        store: Arc<dyn SessionStore>,
        notifier: Arc<dyn Notifier>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            interval_minutes: interval.num_minutes(),
        }
    }

    pub async fn try_fire(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<FireOutcome, GuardError> {
        let session = self
            .store
            .get_session(user_id)
            .await?
            .ok_or_else(|| GuardError::SessionNotFound(user_id.clone()))?;
        if session.is_acknowledged() {
            return Ok(FireOutcome::AlreadyFired);
        }

        match self
            .store
            .claim_marker(user_id, session.started_at, now)
            .await?
        {
            MarkerClaim::Claimed => {}
            MarkerClaim::AlreadySet => {
                tracing::debug!(user_id = %user_id, "Marker claimed by a concurrent dispatch");
                return Ok(FireOutcome::AlreadyFired);
            }
            MarkerClaim::Superseded => {
                tracing::debug!(user_id = %user_id, "Session restarted before the claim");
                return Ok(FireOutcome::Superseded);
            }
            MarkerClaim::NoSession => return Err(GuardError::SessionNotFound(user_id.clone())),
        }

        let notification =
            Notification::workout_reminder(&session.session_type, self.interval_minutes);
        if let Err(err) = self.deliver(user_id, &notification).await {
            self.release(user_id, now).await;
            return Err(err);
        }

        tracing::info!(user_id = %user_id, %now, "Reminder sent");
        Ok(FireOutcome::Fired)
    }

    async fn deliver(
        &self,
        user_id: &UserId,
        notification: &Notification,
    ) -> Result<(), GuardError> {
        let token = self
            .notifier
            .device_token(user_id)
            .await?
            .ok_or_else(|| GuardError::MissingDeviceToken(user_id.clone()))?;
        self.notifier.send(&token, notification).await?;
        Ok(())
    }

    /// Undo a claim after a failed delivery so the next tick retries.
    async fn release(&self, user_id: &UserId, claimed_at: DateTime<Utc>) {
        match self.store.release_marker(user_id, claimed_at).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(user_id = %user_id, "Marker changed before release; leaving it")
            }
            Err(e) => tracing::error!(
                user_id = %user_id,
                error = %e,
                "Failed to release reminder marker; session will not be retried"
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedDispatch {
    pub user_id: UserId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub evaluated_at: DateTime<Utc>,
    pub candidates: usize,
    pub fired: Vec<UserId>,
    pub already_fired: usize,
    pub superseded: usize,
    pub failed: Vec<FailedDispatch>,
}

impl TickReport {
    fn empty(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            evaluated_at,
            candidates: 0,
            fired: Vec::new(),
            already_fired: 0,
            superseded: 0,
            failed: Vec::new(),
        }
    }
}

/// One tick: evaluate, then run the guard for every candidate concurrently.
#[derive(Clone)]
pub struct ReminderScheduler {
    evaluator: TickEvaluator,
    guard: DispatchGuard,
}

impl ReminderScheduler {
    pub fn new(evaluator: TickEvaluator, guard: DispatchGuard) -> Self {
        Self { evaluator, guard }
    }

    pub fn guard(&self) -> &DispatchGuard {
        &self.guard
    }

    /// Per-session failures are collected in the report; only a failed
    /// schedule scan fails the tick as a whole.
    pub async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickReport, StoreError> {
        let candidates = self.evaluator.evaluate(now).await?;
        let mut report = TickReport::empty(now);
        report.candidates = candidates.len();

        let mut tasks = JoinSet::new();
        for user_id in candidates {
            let guard = self.guard.clone();
            tasks.spawn(async move {
                let outcome = guard.try_fire(&user_id, now).await;
                (user_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((user_id, Ok(FireOutcome::Fired))) => report.fired.push(user_id),
                Ok((_, Ok(FireOutcome::AlreadyFired))) => report.already_fired += 1,
                Ok((_, Ok(FireOutcome::Superseded))) => report.superseded += 1,
                Ok((user_id, Err(e))) => {
                    tracing::warn!(user_id = %user_id, error = %e, "Reminder dispatch failed");
                    report.failed.push(FailedDispatch {
                        user_id,
                        error: e.to_string(),
                    });
                }
                Err(e) => tracing::error!(error = %e, "Reminder dispatch task panicked"),
            }
        }

        if !report.fired.is_empty() || !report.failed.is_empty() {
            tracing::info!(
                candidates = report.candidates,
                fired = report.fired.len(),
                already_fired = report.already_fired,
                failed = report.failed.len(),
                "Reminder tick complete"
            );
        }
        Ok(report)
    }

    /// Fire a tick every `period`. Each tick runs as its own task so a slow
    /// tick never delays the next one; the guard keeps overlapping ticks safe.
    pub fn start(
        self: Arc<Self>,
        period: std::time::Duration,
        clock: Arc<dyn Clock>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let scheduler = Arc::clone(&self);
                let now = clock.now();
                tokio::spawn(async move {
                    if let Err(e) = scheduler.run_tick(now).await {
                        tracing::error!(error = %e, "Reminder tick failed to read schedules");
                    }
                });
            }
        })
    }
}
