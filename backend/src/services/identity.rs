//! Identity resolution: opaque OAuth access token → registered user.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    config::OAuthConfig,
    models::UserRecord,
    repositories::{user as user_repo, StoreError},
    types::UserId,
};

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("access token is missing")]
    MissingToken,
    #[error("identity provider rejected the access token (status {0})")]
    Rejected(u16),
    #[error("identity provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("identity provider returned no usable profile")]
    IncompleteProfile,
    #[error("no registered user for {0}")]
    UnknownUser(String),
    #[error("user directory lookup failed: {0}")]
    Directory(#[from] StoreError),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_user(&self, access_token: &str) -> Result<UserRecord, ResolutionError>;
}

/// Lookup of registered users by verified email.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(user_repo::find_user_by_email(&self.pool, email).await?)
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    id: Option<String>,
    email: Option<String>,
    name: Option<String>,
}

/// Resolves users through the Google OAuth2 userinfo endpoint.
///
/// With a directory attached the email must belong to a registered user;
/// without one the userinfo profile itself becomes the user record.
pub struct GoogleIdentityResolver {
    http: Client,
    userinfo_url: String,
    directory: Option<Arc<dyn UserDirectory>>,
}

impl GoogleIdentityResolver {
    pub fn new(http: Client, oauth: &OAuthConfig) -> Self {
        Self {
            http,
            userinfo_url: oauth.userinfo_url.clone(),
            directory: None,
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn UserDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    async fn fetch_userinfo(&self, access_token: &str) -> Result<UserInfo, ResolutionError> {
        let resp = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        match resp.status() {
            StatusCode::OK => Ok(resp.json::<UserInfo>().await?),
            status => {
                tracing::warn!(status = status.as_u16(), "OAuth userinfo request was rejected");
                Err(ResolutionError::Rejected(status.as_u16()))
            }
        }
    }
}

#[async_trait]
impl IdentityResolver for GoogleIdentityResolver {
    async fn resolve_user(&self, access_token: &str) -> Result<UserRecord, ResolutionError> {
        if access_token.trim().is_empty() {
            return Err(ResolutionError::MissingToken);
        }

        let info = self.fetch_userinfo(access_token).await?;
        let email = info
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or(ResolutionError::IncompleteProfile)?;
        tracing::debug!(%email, "Resolved email from access token");

        match &self.directory {
            Some(directory) => directory
                .find_by_email(&email)
                .await?
                .ok_or(ResolutionError::UnknownUser(email)),
            None => {
                let id = info
                    .id
                    .and_then(|raw| UserId::new(raw).ok())
                    .ok_or(ResolutionError::IncompleteProfile)?;
                let display_name = info.name.unwrap_or_else(|| email.clone());
                Ok(UserRecord {
                    id,
                    email,
                    display_name,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, routing::get, Json, Router};
    use serde_json::{json, Value};

    async fn userinfo(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth != "Bearer good-token" {
            return Err(StatusCode::UNAUTHORIZED);
        }
        Ok(Json(json!({
            "id": "google-123",
            "email": "ada@example.com",
            "name": "Ada Lovelace"
        })))
    }

    async fn spawn_userinfo_server() -> String {
        let app = Router::new().route("/userinfo", get(userinfo));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{}/userinfo", addr)
    }

    fn resolver(url: String) -> GoogleIdentityResolver {
        GoogleIdentityResolver::new(Client::new(), &OAuthConfig { userinfo_url: url })
    }

    #[tokio::test]
    async fn resolves_profile_without_directory() {
        let url = spawn_userinfo_server().await;
        let user = resolver(url).resolve_user("good-token").await.expect("resolve");
        assert_eq!(user.id.as_str(), "google-123");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.display_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn rejected_token_maps_to_rejected_error() {
        let url = spawn_userinfo_server().await;
        let err = resolver(url).resolve_user("bad-token").await.unwrap_err();
        assert!(matches!(err, ResolutionError::Rejected(401)));
    }

    #[tokio::test]
    async fn blank_token_fails_before_any_request() {
        let resolver = resolver("http://127.0.0.1:9/unreachable".to_string());
        let err = resolver.resolve_user("  ").await.unwrap_err();
        assert!(matches!(err, ResolutionError::MissingToken));
    }

    #[tokio::test]
    async fn directory_lookup_decides_the_user_record() {
        let url = spawn_userinfo_server().await;
        let mut directory = MockUserDirectory::new();
        directory
            .expect_find_by_email()
            .withf(|email| email.to_string() == "ada@example.com")
            .times(1)
            .returning(|_| {
                Ok(Some(UserRecord {
                    id: UserId::new("firebase-uid").unwrap(),
                    email: "ada@example.com".into(),
                    display_name: "Ada".into(),
                }))
            });

        let user = resolver(url)
            .with_directory(Arc::new(directory))
            .resolve_user("good-token")
            .await
            .expect("resolve");
        assert_eq!(user.id.as_str(), "firebase-uid");
    }

    #[tokio::test]
    async fn unknown_email_is_a_resolution_failure() {
        let url = spawn_userinfo_server().await;
        let mut directory = MockUserDirectory::new();
        directory.expect_find_by_email().returning(|_| Ok(None));

        let err = resolver(url)
            .with_directory(Arc::new(directory))
            .resolve_user("good-token")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownUser(email) if email == "ada@example.com"));
    }
}
