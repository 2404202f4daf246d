//! In-memory session provider for testing.
//!
//! Behaves like the hosted auth service from the identity core's point of
//! view: it keeps one current session, emits `SignedIn` / `SignedOut` /
//! `TokenRefreshed` notifications, and greets each new subscriber with an
//! `InitialSession` notification. On top of that it lets tests inject
//! failures and push arbitrary notifications to reproduce races.
//!
//! # Panics
//!
//! Methods may panic if internal locks are poisoned. This adapter is for
//! tests only.
//!
//! # Example
//!
//! ```ignore
//! let provider = InMemorySessionProvider::new()
//!     .with_account("ana@clinic.example", "s3cret!", "u1");
//!
//! let creds = SignInCredentials::new("ana@clinic.example", "s3cret!")?;
//! provider.sign_in_with_credentials(&creds).await?;
//! assert_eq!(provider.sign_in_count(), 1);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::NotificationFanout;
use crate::domain::foundation::{AuthError, PrincipalId, Timestamp};
use crate::domain::identity::{AuthNotification, Principal, Session, SignInCredentials};
use crate::ports::{AuthSubscription, SessionProvider};

/// Lifetime given to issued access tokens.
const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone)]
struct Account {
    password: String,
    principal: Principal,
}

/// In-memory `SessionProvider` for tests.
#[derive(Debug)]
pub struct InMemorySessionProvider {
    /// Accounts keyed by email
    accounts: RwLock<HashMap<String, Account>>,
    current: RwLock<Option<Session>>,
    /// Optional error returned by every call (for error testing)
    force_error: RwLock<Option<AuthError>>,
    greet_subscribers: bool,
    fanout: NotificationFanout,
    issued_tokens: AtomicU64,
    session_lookups: AtomicUsize,
    sign_ins: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl InMemorySessionProvider {
    /// Creates an empty provider with nobody signed in.
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            current: RwLock::new(None),
            force_error: RwLock::new(None),
            greet_subscribers: true,
            fanout: NotificationFanout::new(),
            issued_tokens: AtomicU64::new(0),
            session_lookups: AtomicUsize::new(0),
            sign_ins: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }

    /// Registers an account that can sign in.
    pub fn with_account(
        self,
        email: impl Into<String>,
        password: impl Into<String>,
        principal_id: impl Into<String>,
    ) -> Self {
        let email = email.into();
        let principal = Principal::new(
            PrincipalId::new(principal_id).expect("InMemorySessionProvider: empty principal id"),
        )
        .with_email(email.clone());
        self.accounts.write().expect("accounts lock poisoned").insert(
            email,
            Account {
                password: password.into(),
                principal,
            },
        );
        self
    }

    /// Starts the provider with an already-established session.
    pub fn with_session(self, session: Session) -> Self {
        *self.current.write().expect("session lock poisoned") = Some(session);
        self
    }

    /// Starts the provider signed in as a bare principal with a fresh token.
    pub fn with_signed_in(self, principal_id: impl Into<String>) -> Self {
        let principal = Principal::new(
            PrincipalId::new(principal_id).expect("InMemorySessionProvider: empty principal id"),
        );
        let session = self.issue_session(principal);
        self.with_session(session)
    }

    /// Stops greeting new subscribers with an `InitialSession` notification.
    pub fn without_initial_notification(mut self) -> Self {
        self.greet_subscribers = false;
        self
    }

    /// Forces every call to return the specified error.
    pub fn with_error(self, error: AuthError) -> Self {
        self.set_error(error);
        self
    }

    /// Forces every call to return the specified error, at runtime.
    pub fn set_error(&self, error: AuthError) {
        *self.force_error.write().expect("error lock poisoned") = Some(error);
    }

    /// Clears the forced error and returns to normal operation.
    pub fn clear_error(&self) {
        *self.force_error.write().expect("error lock poisoned") = None;
    }

    /// Pushes an arbitrary notification to every subscriber.
    ///
    /// Does not touch the provider's own session; use it to replay races.
    pub fn emit(&self, notification: AuthNotification) -> usize {
        self.fanout.emit(notification)
    }

    /// Issues a new access token for the current principal and emits `TokenRefreshed`.
    ///
    /// Returns `None` when nobody is signed in.
    pub fn refresh(&self) -> Option<Session> {
        let principal = self.current_snapshot()?.principal().clone();
        let session = self.issue_session(principal);
        *self.current.write().expect("session lock poisoned") = Some(session.clone());
        self.fanout.emit(AuthNotification::token_refreshed(session.clone()));
        Some(session)
    }

    /// Simulates provider-side expiry: drops the session and emits `SignedOut`.
    pub fn expire(&self) {
        if self.current.write().expect("session lock poisoned").take().is_some() {
            self.fanout.emit(AuthNotification::signed_out());
        }
    }

    /// The session the provider holds right now.
    pub fn current_snapshot(&self) -> Option<Session> {
        self.current.read().expect("session lock poisoned").clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.fanout.subscriber_count()
    }

    pub fn session_lookup_count(&self) -> usize {
        self.session_lookups.load(Ordering::SeqCst)
    }

    pub fn sign_in_count(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }

    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn issue_session(&self, principal: Principal) -> Session {
        let n = self.issued_tokens.fetch_add(1, Ordering::SeqCst) + 1;
        let session = Session::new(principal, format!("access-{}", n)).with_refresh_token(format!("refresh-{}", n));
        match Timestamp::now().plus_secs(TOKEN_TTL_SECS) {
            Some(expires_at) => session.with_expires_at(expires_at),
            None => session,
        }
    }

    fn check_error(&self) -> Result<(), AuthError> {
        match self.force_error.read().expect("error lock poisoned").clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Default for InMemorySessionProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for InMemorySessionProvider {
    async fn current_session(&self) -> Result<Option<Session>, AuthError> {
        self.session_lookups.fetch_add(1, Ordering::SeqCst);
        self.check_error()?;
        Ok(self.current_snapshot())
    }

    async fn sign_in_with_credentials(
        &self,
        credentials: &SignInCredentials,
    ) -> Result<Session, AuthError> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        self.check_error()?;

        let account = self
            .accounts
            .read()
            .expect("accounts lock poisoned")
            .get(credentials.email())
            .cloned()
            .ok_or(AuthError::InvalidCredentials)?;
        if account.password != credentials.expose_password() {
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.issue_session(account.principal);
        *self.current.write().expect("session lock poisoned") = Some(session.clone());
        self.fanout.emit(AuthNotification::signed_in(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.check_error()?;
        self.expire();
        Ok(())
    }

    fn subscribe(&self) -> AuthSubscription {
        if self.greet_subscribers {
            self.fanout
                .subscribe_with(AuthNotification::initial_session(self.current_snapshot()))
        } else {
            self.fanout.subscribe()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::AuthEvent;

    fn credentials(email: &str, password: &str) -> SignInCredentials {
        SignInCredentials::new(email, password).unwrap()
    }

    fn provider() -> InMemorySessionProvider {
        InMemorySessionProvider::new().with_account("ana@clinic.example", "s3cret!", "u1")
    }

    #[tokio::test]
    async fn sign_in_with_valid_credentials_returns_session_and_notifies() {
        let provider = provider().without_initial_notification();
        let mut subscription = provider.subscribe();

        let session = provider
            .sign_in_with_credentials(&credentials("ana@clinic.example", "s3cret!"))
            .await
            .unwrap();

        assert_eq!(session.principal_id().as_str(), "u1");
        assert_eq!(session.principal().email.as_deref(), Some("ana@clinic.example"));
        let notification = subscription.recv().await.unwrap();
        assert_eq!(notification.event, AuthEvent::SignedIn);
        assert_eq!(notification.session, Some(session));
    }

    #[tokio::test]
    async fn sign_in_with_wrong_password_is_invalid_credentials() {
        let provider = provider();
        let result = provider
            .sign_in_with_credentials(&credentials("ana@clinic.example", "wrong-pass"))
            .await;
        assert_eq!(result.unwrap_err(), AuthError::InvalidCredentials);
        assert!(provider.current_snapshot().is_none());
    }

    #[tokio::test]
    async fn sign_in_with_unknown_email_is_invalid_credentials() {
        let result = provider()
            .sign_in_with_credentials(&credentials("nobody@clinic.example", "s3cret!"))
            .await;
        assert_eq!(result.unwrap_err(), AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn sign_out_is_idempotent_and_notifies_once() {
        let provider = provider().with_signed_in("u1").without_initial_notification();
        let mut subscription = provider.subscribe();

        provider.sign_out().await.unwrap();
        provider.sign_out().await.unwrap();

        assert_eq!(subscription.recv().await, Some(AuthNotification::signed_out()));
        assert!(subscription.try_recv().is_none());
        assert_eq!(provider.sign_out_count(), 2);
        assert!(provider.current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn new_subscriber_is_greeted_with_initial_session() {
        let provider = provider().with_signed_in("u1");
        let mut subscription = provider.subscribe();

        let greeting = subscription.recv().await.unwrap();
        assert_eq!(greeting.event, AuthEvent::InitialSession);
        assert_eq!(greeting.principal_id().map(|id| id.as_str()), Some("u1"));
    }

    #[tokio::test]
    async fn refresh_issues_new_token_for_same_principal() {
        let provider = provider().with_signed_in("u1").without_initial_notification();
        let before = provider.current_snapshot().unwrap();
        let mut subscription = provider.subscribe();

        let after = provider.refresh().unwrap();

        assert_eq!(after.principal_id(), before.principal_id());
        assert_ne!(after, before);
        assert_eq!(subscription.recv().await.unwrap().event, AuthEvent::TokenRefreshed);
    }

    #[tokio::test]
    async fn forced_error_applies_to_every_call() {
        let provider = provider().with_error(AuthError::provider("down"));
        assert!(provider.current_session().await.is_err());
        assert!(provider.sign_out().await.is_err());

        provider.clear_error();
        assert!(provider.current_session().await.is_ok());
        assert_eq!(provider.session_lookup_count(), 2);
    }
}
