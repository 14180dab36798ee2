//! Webhook for the conversational intent-routing layer.
//!
//! Every request gets a terminal spoken reply with HTTP 200; failures are
//! turned into apologetic messages rather than error statuses so the
//! assistant never hangs waiting on us.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::{models::Notification, services::RegistrationError, state::AppState};

pub const ACTION_WELCOME: &str = "input.welcome";
pub const ACTION_START_SESSION: &str = "startSession";

pub const MSG_TOKEN_UNAVAILABLE: &str = "Access token is unavailable";
pub const MSG_UNKNOWN_USER: &str = "Couldn't find registered user for you.";
pub const MSG_START_FAILED: &str = "Something went wrong, I couldn't start the session.";
pub const MSG_ASK_SESSION_TYPE: &str = "What kind of session are you starting?";
pub const MSG_UNKNOWN_ACTION: &str = "Sorry, I can't help with that yet.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentRequest {
    #[serde(default)]
    pub result: IntentResult,
    #[serde(default)]
    pub original_request: Option<OriginalRequest>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IntentResult {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OriginalRequest {
    #[serde(default)]
    pub data: OriginalRequestData,
}

#[derive(Debug, Default, Deserialize)]
pub struct OriginalRequestData {
    #[serde(default)]
    pub user: Option<AssistantUser>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantUser {
    #[serde(default)]
    pub access_token: Option<String>,
}

impl FulfillmentRequest {
    pub fn access_token(&self) -> Option<&str> {
        self.original_request
            .as_ref()?
            .data
            .user
            .as_ref()?
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.result.parameters.get(name)?.as_str()
    }
}

#[derive(Debug, Validate)]
pub struct StartSessionParams {
    #[validate(length(min = 1))]
    pub session_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentResponse {
    pub speech: String,
    pub display_text: String,
    pub data: serde_json::Value,
}

impl FulfillmentResponse {
    /// Final reply that closes the conversation.
    pub fn tell(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            speech: message.clone(),
            display_text: message,
            data: serde_json::json!({ "google": { "expect_user_response": false } }),
        }
    }
}

pub async fn fulfillment(
    State(state): State<AppState>,
    Json(request): Json<FulfillmentRequest>,
) -> Json<FulfillmentResponse> {
    let action = request.result.action.as_str();
    tracing::info!(action, "Handling fulfillment request");

    let Some(access_token) = request.access_token() else {
        tracing::warn!(action, "User access token is unavailable");
        return Json(FulfillmentResponse::tell(MSG_TOKEN_UNAVAILABLE));
    };

    let reply = match action {
        ACTION_WELCOME => greet(&state, access_token).await,
        ACTION_START_SESSION => {
            start_session(&state, access_token, request.parameter("SessionType")).await
        }
        other => {
            tracing::warn!(action = other, "Unhandled fulfillment action");
            FulfillmentResponse::tell(MSG_UNKNOWN_ACTION)
        }
    };
    Json(reply)
}

async fn greet(state: &AppState, access_token: &str) -> FulfillmentResponse {
    let user = match state.identity.resolve_user(access_token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Couldn't resolve user for greeting");
            return FulfillmentResponse::tell(MSG_UNKNOWN_USER);
        }
    };
    tracing::info!(user_id = %user.id, email = %user.email, "Found user for greeting");

    let delivered = match state.notifier.device_token(&user.id).await {
        Ok(Some(token)) => {
            let notification = Notification::greeting(&user.display_name, &user.email)
                .with_data("user_id", user.id.as_str());
            match state.notifier.send(&token, &notification).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(user_id = %user.id, error = %e, "Greeting push failed");
                    false
                }
            }
        }
        Ok(None) => {
            tracing::info!(user_id = %user.id, "No device registered for greeting push");
            false
        }
        Err(e) => {
            tracing::warn!(user_id = %user.id, error = %e, "Device token lookup failed");
            false
        }
    };

    if delivered {
        FulfillmentResponse::tell(format!("Hello {}", user.display_name))
    } else {
        FulfillmentResponse::tell(format!(
            "Hello {}. Sorry, I couldn't send a notification to your device.",
            user.display_name
        ))
    }
}

async fn start_session(
    state: &AppState,
    access_token: &str,
    session_type: Option<&str>,
) -> FulfillmentResponse {
    let params = StartSessionParams {
        session_type: session_type.unwrap_or_default().trim().to_string(),
    };
    if let Err(e) = params.validate() {
        tracing::info!(error = %e, "Rejected session type");
        return FulfillmentResponse::tell(MSG_ASK_SESSION_TYPE);
    }
    tracing::info!(session_type = %params.session_type, "New session requested");

    let user = match state.identity.resolve_user(access_token).await {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Couldn't resolve user for new session");
            return FulfillmentResponse::tell(MSG_UNKNOWN_USER);
        }
    };

    match state
        .registrar
        .start_session(&user.id, &params.session_type)
        .await
    {
        Ok(session) => FulfillmentResponse::tell(format!(
            "Now I know that you are {}. I'll remind you to do some workout every {} minutes.",
            session.session_type, state.config.reminder_interval_minutes
        )),
        Err(RegistrationError::InvalidInput(reason)) => {
            tracing::info!(user_id = %user.id, reason, "Registration rejected");
            FulfillmentResponse::tell(MSG_ASK_SESSION_TYPE)
        }
        Err(e) => {
            tracing::error!(user_id = %user.id, error = %e, "Couldn't start the session");
            FulfillmentResponse::tell(MSG_START_FAILED)
        }
    }
}
