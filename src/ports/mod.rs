//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the identity core and the outside world. Adapters implement these ports.
//!
//! - `SessionProvider` - the remote identity/session service (sign-in,
//!   sign-out, current session, lifecycle notifications)
//! - `ProfileResolver` - single-record lookup of the profile owned by a principal

mod profile_resolver;
mod session_provider;

pub use profile_resolver::ProfileResolver;
pub use session_provider::{AuthSubscription, SessionProvider};
