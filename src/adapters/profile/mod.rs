//! Profile adapters.
//!
//! Implementations of the `ProfileResolver` port:
//!
//! - `rest` - PostgREST-style REST lookup (hosted database API)
//! - `postgres` - Direct PostgreSQL lookup via sqlx
//! - `mock` - In-memory resolver for tests, with call counting and gated completion

mod mock;
mod postgres;
mod rest;

pub use mock::{FetchGate, InMemoryProfileResolver};
pub use postgres::PgProfileResolver;
pub use rest::{RestProfileConfig, RestProfileResolver};
