//! Sign-in credentials.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::domain::foundation::ValidationError;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Validated email/password pair for the `login` command.
///
/// Construction rejects values the sign-in form would reject, so a request
/// never reaches the provider with an obviously malformed identifier.
#[derive(Clone)]
pub struct SignInCredentials {
    email: String,
    password: SecretString,
}

impl SignInCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Result<Self, ValidationError> {
        let email = email.into().trim().to_string();
        let password = password.into();

        validate_email(&email)?;
        if password.is_empty() {
            return Err(ValidationError::empty_field("password"));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::too_short("password", MIN_PASSWORD_LENGTH));
        }

        Ok(Self {
            email,
            password: SecretString::new(password),
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }

    /// Returns the password for the one call that needs it.
    pub fn expose_password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl fmt::Debug for SignInCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInCredentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::empty_field("email"));
    }
    if email.chars().any(char::is_whitespace) {
        return Err(ValidationError::invalid_format("email", "contains whitespace"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::invalid_format("email", "missing '@'"));
    };
    if local.is_empty() || domain.contains('@') {
        return Err(ValidationError::invalid_format("email", "malformed local part"));
    }
    let labels_ok = domain.contains('.') && domain.split('.').all(|label| !label.is_empty());
    if !labels_ok {
        return Err(ValidationError::invalid_format("email", "malformed domain"));
    }
    Ok(())
}
