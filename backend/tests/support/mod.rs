#![allow(dead_code)]
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use standup_backend::{
    build_router,
    config::{Config, OAuthConfig, PushConfig, StoreBackend},
    models::{Notification, ScheduleEntry, Session, UserRecord},
    repositories::{
        DeviceTokenStore, MarkerClaim, MemorySessionStore, MemoryDeviceTokenStore, SessionStore,
        StoreError,
    },
    services::{IdentityResolver, Notifier, ResolutionError, SendError},
    types::UserId,
    utils::time::ManualClock,
    AppState, Components,
};
use tower::ServiceExt;

pub const GOOD_TOKEN: &str = "token-ada";

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
}

pub fn ada_id() -> UserId {
    UserId::new("uid-ada").unwrap()
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        store_backend: StoreBackend::Memory,
        reminder_interval_minutes: 25,
        tick_interval_seconds: 60,
        tick_secret: None,
        oauth: OAuthConfig {
            userinfo_url: "http://127.0.0.1:9/userinfo".into(),
        },
        push: PushConfig {
            server_key: "test-key".into(),
            endpoint: "http://127.0.0.1:9/fcm/send".into(),
        },
    }
}

/// Identity resolver that knows a fixed set of access tokens.
pub struct FakeIdentity {
    users: HashMap<String, UserRecord>,
}

impl FakeIdentity {
    pub fn with_ada() -> Self {
        let mut users = HashMap::new();
        users.insert(
            GOOD_TOKEN.to_string(),
            UserRecord {
                id: ada_id(),
                email: "ada@example.com".into(),
                display_name: "Ada".into(),
            },
        );
        Self { users }
    }
}

#[async_trait]
impl IdentityResolver for FakeIdentity {
    async fn resolve_user(&self, access_token: &str) -> Result<UserRecord, ResolutionError> {
        self.users
            .get(access_token)
            .cloned()
            .ok_or(ResolutionError::Rejected(401))
    }
}

/// Notifier that records deliveries and can be told to fail the next sends.
pub struct FakeNotifier {
    tokens: Arc<dyn DeviceTokenStore>,
    sent: Mutex<Vec<(String, Notification)>>,
    failures_left: Mutex<usize>,
}

impl FakeNotifier {
    pub fn new(tokens: Arc<dyn DeviceTokenStore>) -> Self {
        Self {
            tokens,
            sent: Mutex::new(Vec::new()),
            failures_left: Mutex::new(0),
        }
    }

    pub fn fail_next(&self, count: usize) {
        *self.failures_left.lock().unwrap() = count;
    }

    pub fn sent(&self) -> Vec<(String, Notification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn device_token(&self, user_id: &UserId) -> Result<Option<String>, SendError> {
        Ok(self.tokens.device_token(user_id).await?)
    }

    async fn send(&self, token: &str, notification: &Notification) -> Result<(), SendError> {
        {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(SendError::Rejected {
                    status: 503,
                    reason: "Unavailable".into(),
                });
            }
        }
        self.sent
            .lock()
            .unwrap()
            .push((token.to_string(), notification.clone()));
        Ok(())
    }
}

/// Memory store whose session writes can be switched to fail.
pub struct FlakySessionStore {
    inner: Arc<MemorySessionStore>,
    fail_writes: AtomicBool,
}

impl FlakySessionStore {
    pub fn new(inner: Arc<MemorySessionStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn get_session(&self, user_id: &UserId) -> Result<Option<Session>, StoreError> {
        self.inner.get_session(user_id).await
    }

    async fn put_session(&self, session: &Session) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("write rejected".into()));
        }
        self.inner.put_session(session).await
    }

    async fn list_schedules(&self) -> Result<Vec<ScheduleEntry>, StoreError> {
        self.inner.list_schedules().await
    }

    async fn claim_marker(
        &self,
        user_id: &UserId,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<MarkerClaim, StoreError> {
        self.inner.claim_marker(user_id, started_at, now).await
    }

    async fn release_marker(
        &self,
        user_id: &UserId,
        claimed_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.inner.release_marker(user_id, claimed_at).await
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub store: Arc<MemorySessionStore>,
    pub session_store: Arc<FlakySessionStore>,
    pub device_tokens: Arc<MemoryDeviceTokenStore>,
    pub notifier: Arc<FakeNotifier>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemorySessionStore::new());
        let session_store = Arc::new(FlakySessionStore::new(store.clone()));
        let device_tokens = Arc::new(MemoryDeviceTokenStore::new());
        let notifier = Arc::new(FakeNotifier::new(device_tokens.clone()));
        let clock = Arc::new(ManualClock::new(t0()));
        let state = AppState::new(
            config,
            Components {
                store: session_store.clone(),
                device_tokens: device_tokens.clone(),
                notifier: notifier.clone(),
                identity: Arc::new(FakeIdentity::with_ada()),
                clock: clock.clone(),
            },
        );
        let router = build_router(state.clone());
        Self {
            state,
            router,
            store,
            session_store,
            device_tokens,
            notifier,
            clock,
        }
    }

    pub async fn register_ada_device(&self) {
        self.device_tokens
            .set_device_token(&ada_id(), "device-ada")
            .await
            .expect("register device");
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn tick(&self) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/tick")
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}

pub fn fulfillment_body(action: &str, token: Option<&str>, session_type: Option<&str>) -> Value {
    let mut body = serde_json::json!({
        "result": { "action": action, "parameters": {} }
    });
    if let Some(session_type) = session_type {
        body["result"]["parameters"]["SessionType"] = Value::from(session_type);
    }
    if let Some(token) = token {
        body["originalRequest"] = serde_json::json!({
            "data": { "user": { "accessToken": token } }
        });
    }
    body
}
