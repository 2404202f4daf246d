//! Identity synchronization.
//!
//! - `IdentityStateMachine` - single writer of the identity snapshot
//! - `IdentityReader` - read-only observer handed to consumers and routing
//! - `IdentityRuntime` - background task driving the machine from the provider feed

mod machine;
mod reader;
mod runtime;

pub use machine::{Bootstrap, FetchOutcome, IdentityStateMachine, ProfileFetch};
pub use reader::IdentityReader;
pub use runtime::IdentityRuntime;
