//! Identity module - who the caller is, and what the portal knows about them.
//!
//! # Types
//!
//! - `Principal` / `Session` - the authenticated identity as the auth provider sees it
//! - `AuthEvent` / `AuthNotification` - session lifecycle notifications
//! - `Role` / `Profile` - the application record owned by a principal
//! - `SignInCredentials` - validated email/password pair for the login command
//! - `IdentityState` / `IdentityPhase` - the snapshot every consumer reads

mod credentials;
mod profile;
mod role;
mod session;
mod state;

pub use credentials::{SignInCredentials, MIN_PASSWORD_LENGTH};
pub use profile::Profile;
pub use role::Role;
pub use session::{AuthEvent, AuthNotification, Principal, Session};
pub use state::{IdentityPhase, IdentityState, ResolvedIdentity};
