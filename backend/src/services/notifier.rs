//! Push delivery through Firebase Cloud Messaging.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    config::PushConfig,
    models::Notification,
    repositories::{DeviceTokenStore, StoreError},
    types::UserId,
};

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("push request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("push service rejected the message (status {status}): {reason}")]
    Rejected { status: u16, reason: String },
    #[error("device token lookup failed: {0}")]
    DeviceLookup(#[from] StoreError),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Device token registered for the user, if any.
    async fn device_token(&self, user_id: &UserId) -> Result<Option<String>, SendError>;

    /// Deliver a notification to a single device.
    async fn send(&self, token: &str, notification: &Notification) -> Result<(), SendError>;
}

#[derive(Debug, Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct FcmMessage<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
    data: &'a BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct FcmResult {
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FcmResponse {
    #[serde(default)]
    failure: u32,
    #[serde(default)]
    results: Vec<FcmResult>,
}

pub struct FcmNotifier {
    http: Client,
    endpoint: String,
    server_key: String,
    tokens: Arc<dyn DeviceTokenStore>,
}

impl FcmNotifier {
    pub fn new(http: Client, push: &PushConfig, tokens: Arc<dyn DeviceTokenStore>) -> Self {
        Self {
            http,
            endpoint: push.endpoint.clone(),
            server_key: push.server_key.clone(),
            tokens,
        }
    }
}

#[async_trait]
impl Notifier for FcmNotifier {
    async fn device_token(&self, user_id: &UserId) -> Result<Option<String>, SendError> {
        Ok(self.tokens.device_token(user_id).await?)
    }

    async fn send(&self, token: &str, notification: &Notification) -> Result<(), SendError> {
        let message = FcmMessage {
            to: token,
            notification: FcmNotification {
                title: &notification.title,
                body: &notification.body,
            },
            data: &notification.data,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("key={}", self.server_key),
            )
            .json(&message)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let reason = resp.text().await.unwrap_or_default();
            return Err(SendError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        let body: FcmResponse = resp.json().await?;
        if body.failure > 0 {
            let reason = body
                .results
                .into_iter()
                .find_map(|r| r.error)
                .unwrap_or_else(|| "unknown".to_string());
            return Err(SendError::Rejected {
                status: status.as_u16(),
                reason,
            });
        }

        tracing::debug!(title = %notification.title, "Push notification accepted");
        Ok(())
    }
}
