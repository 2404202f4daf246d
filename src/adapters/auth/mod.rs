//! Authentication adapters.
//!
//! Implementations of the `SessionProvider` port:
//!
//! - `gotrue` - GoTrue-compatible auth REST API (the clinic's hosted auth service)
//! - `mock` - In-memory provider for tests, with fault injection and manual events
//! - `fanout` - Notification fan-out shared by both

mod fanout;
mod gotrue;
mod mock;

pub use fanout::NotificationFanout;
pub use gotrue::{GoTrueConfig, GoTrueSessionProvider};
pub use mock::InMemorySessionProvider;
