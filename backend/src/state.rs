use std::sync::Arc;

use crate::{
    config::{Config, StoreBackend},
    db::{create_pool, run_migrations},
    repositories::{
        DeviceTokenStore, MemoryDeviceTokenStore, MemorySessionStore, PgDeviceTokenStore,
        PgSessionStore, SessionStore,
    },
    services::{
        DispatchGuard, FcmNotifier, GoogleIdentityResolver, IdentityResolver, Notifier,
        PgUserDirectory, ReminderScheduler, SessionRegistrar, TickEvaluator,
    },
    utils::time::{Clock, SystemClock},
};

/// Collaborators handed to [`AppState::new`].
pub struct Components {
    pub store: Arc<dyn SessionStore>,
    pub device_tokens: Arc<dyn DeviceTokenStore>,
    pub notifier: Arc<dyn Notifier>,
    pub identity: Arc<dyn IdentityResolver>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub device_tokens: Arc<dyn DeviceTokenStore>,
    pub notifier: Arc<dyn Notifier>,
    pub identity: Arc<dyn IdentityResolver>,
    pub clock: Arc<dyn Clock>,
    pub registrar: SessionRegistrar,
    pub scheduler: Arc<ReminderScheduler>,
}

impl AppState {
    pub fn new(config: Config, components: Components) -> Self {
        let Components {
            store,
            device_tokens,
            notifier,
            identity,
            clock,
        } = components;
        let interval = config.reminder_interval();

        let registrar = SessionRegistrar::new(store.clone(), clock.clone());
        let scheduler = Arc::new(ReminderScheduler::new(
            TickEvaluator::new(store.clone(), interval),
            DispatchGuard::new(store, notifier.clone(), interval),
        ));

        Self {
            config,
            device_tokens,
            notifier,
            identity,
            clock,
            registrar,
            scheduler,
        }
    }

    /// Wire the production collaborators selected by the configuration.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("standup-backend/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        let (store, device_tokens, identity): (
            Arc<dyn SessionStore>,
            Arc<dyn DeviceTokenStore>,
            Arc<dyn IdentityResolver>,
        ) = match config.store_backend {
            StoreBackend::Postgres => {
                let pool = create_pool(&config.database_url).await?;
                run_migrations(&pool).await?;
                let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(pool.clone()));
                let device_tokens: Arc<dyn DeviceTokenStore> =
                    Arc::new(PgDeviceTokenStore::new(pool.clone()));
                let identity: Arc<dyn IdentityResolver> = Arc::new(
                    GoogleIdentityResolver::new(http.clone(), &config.oauth)
                        .with_directory(Arc::new(PgUserDirectory::new(pool))),
                );
                (store, device_tokens, identity)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory session store; state is lost on restart");
                let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
                let device_tokens: Arc<dyn DeviceTokenStore> =
                    Arc::new(MemoryDeviceTokenStore::new());
                let identity: Arc<dyn IdentityResolver> =
                    Arc::new(GoogleIdentityResolver::new(http.clone(), &config.oauth));
                (store, device_tokens, identity)
            }
        };

        let notifier = Arc::new(FcmNotifier::new(http, &config.push, device_tokens.clone()));

        Ok(Self::new(
            config,
            Components {
                store,
                device_tokens,
                notifier,
                identity,
                clock: Arc::new(SystemClock),
            },
        ))
    }
}
