//! Application layer - orchestration between ports and the domain.
//!
//! The identity core lives here: the state machine that reconciles the
//! session provider's two asynchronous paths and publishes one consistent
//! identity snapshot.

pub mod identity;

pub use identity::{
    Bootstrap, FetchOutcome, IdentityReader, IdentityRuntime, IdentityStateMachine, ProfileFetch,
};
