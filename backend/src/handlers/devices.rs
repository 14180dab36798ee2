use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterDevicePayload {
    #[validate(length(min = 1, max = 4096))]
    pub token: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Registers the push device token for the caller identified by the bearer
/// access token.
pub async fn register_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut payload): Json<RegisterDevicePayload>,
) -> Result<Json<Value>, AppError> {
    payload.token = payload.token.trim().to_string();
    payload.validate()?;
    let access_token = bearer_token(&headers)
        .ok_or_else(|| AppError::Unauthorized("Access token is required".into()))?;

    let user = state.identity.resolve_user(access_token).await?;
    state
        .device_tokens
        .set_device_token(&user.id, &payload.token)
        .await?;
    tracing::info!(user_id = %user.id, "Device token registered");

    Ok(Json(json!({
        "message": "Device registered",
        "user_id": user.id
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_bearer_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok-1"));
        assert_eq!(bearer_token(&headers), Some("tok-1"));
    }
}
