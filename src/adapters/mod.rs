//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the identity core to external systems:
//! - `auth` - Session providers (GoTrue REST API, in-memory for tests)
//! - `profile` - Profile resolvers (PostgREST, PostgreSQL, in-memory for tests)

pub mod auth;
pub mod profile;

pub use auth::{GoTrueConfig, GoTrueSessionProvider, InMemorySessionProvider, NotificationFanout};
pub use profile::{InMemoryProfileResolver, PgProfileResolver, RestProfileConfig, RestProfileResolver};
