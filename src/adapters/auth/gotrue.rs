//! GoTrue session provider.
//!
//! Implements the `SessionProvider` port against a GoTrue-compatible auth
//! REST API (the auth service behind the clinic's hosted backend):
//!
//! - `POST /auth/v1/token?grant_type=password` - sign in
//! - `POST /auth/v1/token?grant_type=refresh_token` - refresh
//! - `POST /auth/v1/logout` - sign out
//!
//! The provider keeps the current session in memory. `current_session`
//! transparently refreshes an expired access token when a refresh token is
//! available, emitting `TokenRefreshed`; a refresh the server rejects ends
//! the session and emits `SignedOut`.
//!
//! # Example
//!
//! ```ignore
//! let config = GoTrueConfig::new("https://project.example.co", "anon-key");
//! let provider = GoTrueSessionProvider::new(config)?;
//!
//! let mut subscription = provider.subscribe();
//! provider.sign_in_with_credentials(&creds).await?;
//! ```

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::NotificationFanout;
use crate::domain::foundation::{AuthError, PrincipalId, Timestamp};
use crate::domain::identity::{AuthNotification, Principal, Session, SignInCredentials};
use crate::ports::{AuthSubscription, SessionProvider};

/// Configuration for the GoTrue adapter.
#[derive(Debug, Clone)]
pub struct GoTrueConfig {
    /// Base URL of the hosted project (e.g., "https://project.example.co").
    pub url: String,

    /// Public API key sent in the `apikey` header.
    pub api_key: SecretString,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl GoTrueConfig {
    /// Create a new configuration with the default 10s timeout.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: SecretString::new(api_key.into()),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.url.trim_end_matches('/'), path)
    }
}

/// Token grant response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: GoTrueUser,
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
    #[serde(default)]
    app_metadata: serde_json::Value,
}

/// Error body. GoTrue has used several shapes over time.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl ErrorBody {
    fn message(&self) -> String {
        self.error_description
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

impl TokenResponse {
    fn into_session(self) -> Result<Session, AuthError> {
        let id = PrincipalId::new(self.user.id).map_err(|_| {
            tracing::error!("Token response carried an empty user id");
            AuthError::provider("token response carried an empty user id")
        })?;

        let mut principal = Principal::new(id).with_metadata(serde_json::json!({
            "user_metadata": self.user.user_metadata,
            "app_metadata": self.user.app_metadata,
        }));
        if let Some(email) = self.user.email {
            principal = principal.with_email(email);
        }

        let expires_at = match (self.expires_at.and_then(Timestamp::from_unix_secs), self.expires_in) {
            (Some(at), _) => Some(at),
            (None, Some(secs)) => Some(Timestamp::now().plus_secs(secs).ok_or_else(|| {
                tracing::error!(expires_in = secs, "Token response carried an out-of-range expiry");
                AuthError::provider("token response carried an out-of-range expiry")
            })?),
            (None, None) => None,
        };

        let mut session = Session::new(principal, self.access_token);
        if let Some(refresh_token) = self.refresh_token {
            session = session.with_refresh_token(refresh_token);
        }
        if let Some(expires_at) = expires_at {
            session = session.with_expires_at(expires_at);
        }
        Ok(session)
    }
}

/// GoTrue-backed session provider.
pub struct GoTrueSessionProvider {
    config: GoTrueConfig,
    http_client: reqwest::Client,
    current: RwLock<Option<Session>>,
    fanout: NotificationFanout,
}

impl GoTrueSessionProvider {
    /// Create a new provider with nobody signed in.
    pub fn new(config: GoTrueConfig) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::provider(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
            current: RwLock::new(None),
            fanout: NotificationFanout::new(),
        })
    }

    /// Seeds a session persisted by an earlier run (e.g., from a token store).
    ///
    /// The session is reported by the next `current_session` call and in the
    /// `InitialSession` greeting of later subscribers.
    pub fn restore(&self, session: Session) {
        self.replace_current(Some(session));
    }

    /// Exchanges the refresh token for a new session and emits `TokenRefreshed`.
    ///
    /// Returns `Ok(None)` when there is nothing to refresh, or when the server
    /// rejected the refresh token (the session is then ended with `SignedOut`).
    pub async fn refresh_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(refresh_token) = self
            .snapshot()
            .and_then(|session| session.refresh_token().cloned())
        else {
            return Ok(None);
        };

        let response = self
            .http_client
            .post(self.config.endpoint("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", self.config.api_key.expose_secret())
            .json(&serde_json::json!({ "refresh_token": refresh_token.expose_secret() }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Token refresh request failed: {}", e);
                AuthError::provider(format!("Token refresh request failed: {}", e))
            })?;

        match response.status() {
            status if status.is_success() => {
                let session = parse_token_response(response).await?;
                self.replace_current(Some(session.clone()));
                self.fanout.emit(AuthNotification::token_refreshed(session.clone()));
                Ok(Some(session))
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                let body = read_error(response).await;
                tracing::warn!("Refresh token rejected: {}", body.message());
                self.end_session();
                Ok(None)
            }
            status => Err(unexpected_status("token refresh", status, response).await),
        }
    }

    fn snapshot(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_current(&self, session: Option<Session>) -> Option<Session> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, session)
    }

    fn end_session(&self) {
        if self.replace_current(None).is_some() {
            self.fanout.emit(AuthNotification::signed_out());
        }
    }
}

#[async_trait]
impl SessionProvider for GoTrueSessionProvider {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        match self.snapshot() {
            Some(session) if session.is_expired() => {
                tracing::debug!("Access token expired, refreshing");
                self.refresh_session().await
            }
            other => Ok(other),
        }
    }

    async fn sign_in_with_credentials(
        &self,
        credentials: &SignInCredentials,
    ) -> Result<Session, AuthError> {
        let response = self
            .http_client
            .post(self.config.endpoint("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", self.config.api_key.expose_secret())
            .json(&serde_json::json!({
                "email": credentials.email(),
                "password": credentials.expose_password(),
            }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Sign-in request failed: {}", e);
                AuthError::provider(format!("Sign-in request failed: {}", e))
            })?;

        match response.status() {
            status if status.is_success() => {
                let session = parse_token_response(response).await?;
                self.replace_current(Some(session.clone()));
                self.fanout.emit(AuthNotification::signed_in(session.clone()));
                Ok(session)
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                let body = read_error(response).await;
                tracing::debug!("Sign-in rejected: {}", body.message());
                Err(AuthError::InvalidCredentials)
            }
            status => Err(unexpected_status("sign-in", status, response).await),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let Some(session) = self.snapshot() else {
            return Ok(());
        };

        let response = self
            .http_client
            .post(self.config.endpoint("logout"))
            .header("apikey", self.config.api_key.expose_secret())
            .bearer_auth(session.access_token().expose_secret())
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Sign-out request failed: {}", e);
                AuthError::provider(format!("Sign-out request failed: {}", e))
            })?;

        match response.status() {
            // The server no longer knows the token: it is signed out either way.
            status if status.is_success()
                || status == StatusCode::UNAUTHORIZED
                || status == StatusCode::NOT_FOUND =>
            {
                self.end_session();
                Ok(())
            }
            status => Err(unexpected_status("sign-out", status, response).await),
        }
    }

    fn subscribe(&self) -> AuthSubscription {
        self.fanout
            .subscribe_with(AuthNotification::initial_session(self.snapshot()))
    }
}

impl std::fmt::Debug for GoTrueSessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoTrueSessionProvider")
            .field("url", &self.config.url)
            .field("subscribers", &self.fanout.subscriber_count())
            .finish_non_exhaustive()
    }
}

async fn parse_token_response(response: reqwest::Response) -> Result<Session, AuthError> {
    let body: TokenResponse = response.json().await.map_err(|e| {
        tracing::error!("Failed to parse token response: {}", e);
        AuthError::provider(format!("Failed to parse token response: {}", e))
    })?;
    body.into_session()
}

async fn read_error(response: reqwest::Response) -> ErrorBody {
    response.json().await.unwrap_or_default()
}

async fn unexpected_status(
    operation: &str,
    status: StatusCode,
    response: reqwest::Response,
) -> AuthError {
    let body = read_error(response).await;
    tracing::error!("{} returned {}: {}", operation, status, body.message());
    AuthError::provider(format!("{} returned {}: {}", operation, status, body.message()))
}
