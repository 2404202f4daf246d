//! In-memory profile resolver for testing.
//!
//! Besides serving canned profiles, the resolver records every lookup and can
//! hold a lookup open until the test releases it. Holding lookups is how the
//! race tests make a slow fetch for one principal finish after a faster
//! sign-out or principal switch.
//!
//! # Example
//!
//! ```ignore
//! let resolver = InMemoryProfileResolver::new()
//!     .with_profile(Profile::new(pid("u1"), Role::Physician));
//!
//! let gate = resolver.hold(&pid("u1"));
//! // ... start a fetch, do something racy ...
//! gate.release();
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::{oneshot, Notify};

use crate::domain::foundation::{PrincipalId, ProfileLookupError};
use crate::domain::identity::Profile;
use crate::ports::ProfileResolver;

/// Keeps one held lookup waiting until released or dropped.
#[derive(Debug)]
pub struct FetchGate {
    sender: oneshot::Sender<()>,
}

impl FetchGate {
    /// Lets the held lookup complete.
    pub fn release(self) {
        let _ = self.sender.send(());
    }
}

/// In-memory `ProfileResolver` for tests.
#[derive(Debug, Default)]
pub struct InMemoryProfileResolver {
    profiles: RwLock<HashMap<PrincipalId, Profile>>,
    /// Errors returned for specific principals
    failures: RwLock<HashMap<PrincipalId, ProfileLookupError>>,
    /// Optional error returned for every principal
    force_error: RwLock<Option<ProfileLookupError>>,
    holds: Mutex<HashMap<PrincipalId, VecDeque<oneshot::Receiver<()>>>>,
    calls: Mutex<Vec<PrincipalId>>,
    call_signal: Notify,
}

impl InMemoryProfileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a profile, keyed by its own id.
    pub fn with_profile(self, profile: Profile) -> Self {
        self.insert(profile);
        self
    }

    /// Makes lookups for `principal_id` fail with `error`.
    pub fn with_failure(self, principal_id: &PrincipalId, error: ProfileLookupError) -> Self {
        self.failures
            .write()
            .expect("failures lock poisoned")
            .insert(principal_id.clone(), error);
        self
    }

    /// Makes every lookup fail with `error`.
    pub fn with_error(self, error: ProfileLookupError) -> Self {
        self.set_error(error);
        self
    }

    pub fn set_error(&self, error: ProfileLookupError) {
        *self.force_error.write().expect("error lock poisoned") = Some(error);
    }

    pub fn clear_error(&self) {
        *self.force_error.write().expect("error lock poisoned") = None;
    }

    /// Adds or replaces a profile at runtime.
    pub fn insert(&self, profile: Profile) {
        self.profiles
            .write()
            .expect("profiles lock poisoned")
            .insert(profile.id.clone(), profile);
    }

    /// Stores a profile under an arbitrary key, even one it does not belong to.
    ///
    /// Simulates a backend that returns the wrong row.
    pub fn insert_under(&self, principal_id: &PrincipalId, profile: Profile) {
        self.profiles
            .write()
            .expect("profiles lock poisoned")
            .insert(principal_id.clone(), profile);
    }

    pub fn remove(&self, principal_id: &PrincipalId) -> Option<Profile> {
        self.profiles
            .write()
            .expect("profiles lock poisoned")
            .remove(principal_id)
    }

    /// Holds the next lookup for `principal_id` until the gate is released.
    ///
    /// Each call holds one more lookup, in order. Dropping the gate releases
    /// the lookup as well.
    pub fn hold(&self, principal_id: &PrincipalId) -> FetchGate {
        let (sender, receiver) = oneshot::channel();
        self.holds
            .lock()
            .expect("holds lock poisoned")
            .entry(principal_id.clone())
            .or_default()
            .push_back(receiver);
        FetchGate { sender }
    }

    /// Number of lookups started for `principal_id`.
    pub fn fetch_count(&self, principal_id: &PrincipalId) -> usize {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .iter()
            .filter(|id| *id == principal_id)
            .count()
    }

    /// Number of lookups started for any principal.
    pub fn total_fetches(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }

    /// Principals looked up so far, in call order.
    pub fn calls(&self) -> Vec<PrincipalId> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }

    /// Waits until at least `count` lookups have started.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let notified = self.call_signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.total_fetches() >= count {
                return;
            }
            notified.await;
        }
    }

    fn record_call(&self, principal_id: &PrincipalId) -> Option<oneshot::Receiver<()>> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(principal_id.clone());
        self.call_signal.notify_waiters();

        self.holds
            .lock()
            .expect("holds lock poisoned")
            .get_mut(principal_id)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl ProfileResolver for InMemoryProfileResolver {
    async fn fetch_profile(&self, principal_id: &PrincipalId) -> Result<Profile, ProfileLookupError> {
        if let Some(held) = self.record_call(principal_id) {
            // A dropped gate counts as a release.
            let _ = held.await;
        }

        if let Some(error) = self.force_error.read().expect("error lock poisoned").clone() {
            return Err(error);
        }
        if let Some(error) = self
            .failures
            .read()
            .expect("failures lock poisoned")
            .get(principal_id)
            .cloned()
        {
            return Err(error);
        }

        self.profiles
            .read()
            .expect("profiles lock poisoned")
            .get(principal_id)
            .cloned()
            .ok_or(ProfileLookupError::NotFound)
    }
}
