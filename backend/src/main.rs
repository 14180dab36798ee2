use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use standup_backend::{
    build_router,
    config::{mask_secret, Config},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "standup_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        store_backend = ?config.store_backend,
        bind_addr = %config.bind_addr,
        reminder_interval_minutes = config.reminder_interval_minutes,
        tick_secret = %mask_secret(config.tick_secret.as_deref().unwrap_or_default()),
        userinfo_url = %config.oauth.userinfo_url,
        fcm_endpoint = %config.push.endpoint,
        fcm_server_key = %mask_secret(&config.push.server_key),
        "Loaded configuration from environment/.env"
    );

    let addr = config.bind_addr;
    let state = AppState::build(config).await?;
    let app = build_router(state);

    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
