//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, error types and the state machine
//! trait that form the vocabulary of the identity core.

mod auth;
mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, ProfileLookupError};
pub use errors::ValidationError;
pub use ids::PrincipalId;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
