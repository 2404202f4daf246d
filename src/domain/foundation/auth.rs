//! Authentication and profile lookup errors.
//!
//! These errors are **domain-centric** - they describe what went wrong from
//! the portal's perspective, not the provider's. Any auth backend
//! (GoTrue, an in-memory double, ...) maps its failures onto them.
//!
//! # Propagation
//!
//! - `AuthError` is returned to callers of the `login` / `logout` commands
//!   and shown next to the form that triggered them.
//! - `ProfileLookupError` never leaves the identity state machine: both
//!   variants are absorbed into `AuthenticatedNoProfile`.

use thiserror::Error;

/// Errors raised by the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The identifier/secret pair was rejected. Surfaced verbatim to the user.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Transport or backend failure while talking to the provider.
    #[error("Auth provider error: {0}")]
    Provider(String),
}

impl AuthError {
    /// Creates a provider error with a message.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Returns true if this is a transient error that may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Provider(_))
    }
}

/// Errors raised by the profile resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileLookupError {
    /// No profile row is owned by the principal (authenticated but unprovisioned).
    #[error("Profile not found")]
    NotFound,

    /// Transport or backend failure while reading the profile store.
    #[error("Profile store error: {0}")]
    Provider(String),
}

impl ProfileLookupError {
    /// Creates a provider error with a message.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_credentials_displays_correctly() {
        assert_eq!(
            format!("{}", AuthError::InvalidCredentials),
            "Invalid login credentials"
        );
    }

    #[test]
    fn provider_error_displays_message() {
        let err = AuthError::provider("connection refused");
        assert_eq!(format!("{}", err), "Auth provider error: connection refused");
    }

    #[test]
    fn only_provider_errors_are_transient() {
        assert!(AuthError::provider("timeout").is_transient());
        assert!(!AuthError::InvalidCredentials.is_transient());
    }

    #[test]
    fn profile_lookup_errors_display_correctly() {
        assert_eq!(format!("{}", ProfileLookupError::NotFound), "Profile not found");
        assert_eq!(
            format!("{}", ProfileLookupError::provider("503")),
            "Profile store error: 503"
        );
    }
}
