//! Principals, sessions and session lifecycle notifications.
//!
//! A `Session` is owned by the session provider; the identity state machine
//! only ever holds a read-only, possibly stale copy of it.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::domain::foundation::{PrincipalId, Timestamp};

/// The authenticated identity, independent of any application profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    pub id: PrincipalId,

    /// Email the principal signed in with, when the provider reports one.
    pub email: Option<String>,

    /// Raw provider metadata, passed through untouched.
    pub metadata: serde_json::Value,
}

impl Principal {
    /// Creates a principal with no email or metadata.
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            email: None,
            metadata: serde_json::Value::Null,
        }
    }

    /// Sets the email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the raw provider metadata.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Server-issued proof of authentication for exactly one principal.
///
/// Tokens are kept in `SecretString` so they never show up in logs.
#[derive(Debug, Clone)]
pub struct Session {
    principal: Principal,
    access_token: SecretString,
    refresh_token: Option<SecretString>,
    expires_at: Option<Timestamp>,
}

impl Session {
    /// Creates a session for a principal with the given access token.
    pub fn new(principal: Principal, access_token: impl Into<String>) -> Self {
        Self {
            principal,
            access_token: SecretString::new(access_token.into()),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Sets the refresh token.
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(SecretString::new(refresh_token.into()));
        self
    }

    /// Sets the access token expiry.
    pub fn with_expires_at(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal.id
    }

    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh_token.as_ref()
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    /// Returns true once the access token's expiry has passed.
    ///
    /// Sessions without a known expiry never report as expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| at.has_passed()).unwrap_or(false)
    }
}

impl PartialEq for Session {
    fn eq(&self, other: &Self) -> bool {
        self.principal == other.principal
            && self.expires_at == other.expires_at
            && self.access_token.expose_secret() == other.access_token.expose_secret()
    }
}

/// Session lifecycle events emitted by the session provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthEvent {
    /// The provider finished restoring whatever session it had at start-up.
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

impl AuthEvent {
    /// Returns the provider's wire name for the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthEvent::InitialSession => "INITIAL_SESSION",
            AuthEvent::SignedIn => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed => "TOKEN_REFRESHED",
        }
    }
}

impl fmt::Display for AuthEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pushed notification: the event plus the session the provider holds now.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthNotification {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthNotification {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    pub fn initial_session(session: Option<Session>) -> Self {
        Self::new(AuthEvent::InitialSession, session)
    }

    pub fn signed_in(session: Session) -> Self {
        Self::new(AuthEvent::SignedIn, Some(session))
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEvent::SignedOut, None)
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self::new(AuthEvent::TokenRefreshed, Some(session))
    }

    /// Principal id carried by the notification, if any.
    pub fn principal_id(&self) -> Option<&PrincipalId> {
        self.session.as_ref().map(Session::principal_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(id: &str) -> Principal {
        Principal::new(PrincipalId::new(id).unwrap())
    }

    #[test]
    fn session_debug_does_not_leak_tokens() {
        let session = Session::new(principal("u1"), "access-secret").with_refresh_token("refresh-secret");
        let printed = format!("{:?}", session);
        assert!(!printed.contains("access-secret"));
        assert!(!printed.contains("refresh-secret"));
    }

    #[test]
    fn sessions_with_different_tokens_are_not_equal() {
        let a = Session::new(principal("u1"), "t1");
        let b = Session::new(principal("u1"), "t2");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn session_expiry() {
        let live = Session::new(principal("u1"), "t").with_expires_at(Timestamp::now().plus_secs(3600).unwrap());
        let stale = Session::new(principal("u1"), "t").with_expires_at(Timestamp::now().plus_secs(-1).unwrap());
        let open_ended = Session::new(principal("u1"), "t");
        assert!(!live.is_expired());
        assert!(stale.is_expired());
        assert!(!open_ended.is_expired());
    }

    #[test]
    fn notification_exposes_principal_id() {
        let n = AuthNotification::signed_in(Session::new(principal("u7"), "t"));
        assert_eq!(n.principal_id().map(|id| id.as_str()), Some("u7"));
        assert!(AuthNotification::signed_out().principal_id().is_none());
    }

    #[test]
    fn auth_event_wire_names() {
        assert_eq!(AuthEvent::InitialSession.to_string(), "INITIAL_SESSION");
        assert_eq!(AuthEvent::TokenRefreshed.as_str(), "TOKEN_REFRESHED");
    }
}
