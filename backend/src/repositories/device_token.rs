//! Per-user push device tokens (`user_settings.device_token`).
//!
//! This trait is designed to be mockable using mockall for testing.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::session_store::StoreError;
use crate::types::UserId;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    /// Device token registered for the user, if any.
    async fn device_token(&self, user_id: &UserId) -> Result<Option<String>, StoreError>;

    /// Register or replace the user's device token.
    async fn set_device_token(&self, user_id: &UserId, token: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgDeviceTokenStore {
    pool: PgPool,
}

impl PgDeviceTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceTokenStore for PgDeviceTokenStore {
    async fn device_token(&self, user_id: &UserId) -> Result<Option<String>, StoreError> {
        let token: Option<Option<String>> =
            sqlx::query_scalar("SELECT device_token FROM user_settings WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(token.flatten().filter(|t| !t.trim().is_empty()))
    }

    async fn set_device_token(&self, user_id: &UserId, token: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_settings (user_id, device_token, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET device_token = EXCLUDED.device_token,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDeviceTokenStore {
    tokens: RwLock<HashMap<UserId, String>>,
}

impl MemoryDeviceTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceTokenStore for MemoryDeviceTokenStore {
    async fn device_token(&self, user_id: &UserId) -> Result<Option<String>, StoreError> {
        Ok(self
            .tokens
            .read()
            .await
            .get(user_id)
            .filter(|t| !t.trim().is_empty())
            .cloned())
    }

    async fn set_device_token(&self, user_id: &UserId, token: &str) -> Result<(), StoreError> {
        self.tokens
            .write()
            .await
            .insert(user_id.clone(), token.to_string());
        Ok(())
    }
}
