use axum::{extract::State, http::HeaderMap, Json};

use crate::{error::AppError, services::TickReport, state::AppState};

pub const TICK_SECRET_HEADER: &str = "x-tick-secret";

/// Entry point for the external one-minute cron.
pub async fn run_tick(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TickReport>, AppError> {
    if let Some(expected) = state.config.tick_secret.as_deref() {
        let provided = headers
            .get(TICK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if provided != expected {
            return Err(AppError::Unauthorized("Invalid tick secret".into()));
        }
    }

    let now = state.clock.now();
    let report = state.scheduler.run_tick(now).await?;
    Ok(Json(report))
}
