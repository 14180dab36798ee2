use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use standup_backend::{config::Config, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "standup_backend=info,reminder_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let period = config.tick_interval();
    let state = AppState::build(config).await?;

    if std::env::args().any(|arg| arg == "--once") {
        let report = state.scheduler.run_tick(state.clock.now()).await?;
        tracing::info!(
            candidates = report.candidates,
            fired = report.fired.len(),
            already_fired = report.already_fired,
            superseded = report.superseded,
            failed = report.failed.len(),
            "Single reminder tick finished"
        );
        return Ok(());
    }

    tracing::info!(period_secs = period.as_secs(), "Starting reminder worker");
    let handle = Arc::clone(&state.scheduler).start(period, state.clock.clone());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping reminder worker");
    handle.abort();
    Ok(())
}
