//! IdentityStateMachine - the single writer of the identity snapshot.
//!
//! Two independent asynchronous paths feed the machine: the bootstrap session
//! lookup and the provider's notification feed. They may interleave in any
//! order, and either may describe a principal that is already stale by the
//! time a profile fetch for it completes.
//!
//! ## Ordering
//!
//! Every accepted notification (and the bootstrap start) bumps a sequence
//! number. A profile fetch is stamped with the sequence number current when it
//! was issued, and its result is applied only if, at completion time:
//!
//! 1. the held principal is still the one the fetch was issued for, and
//! 2. the fetch is still the one registered as in flight for that principal.
//!
//! Anything else is a stale result and is discarded. Nothing is cancelled;
//! superseded fetches run to completion and are ignored.
//!
//! ## Split accept / resolve
//!
//! `accept` is synchronous: it updates the snapshot and returns the fetch to
//! run, if any. Callers that process notifications one at a time (see
//! `IdentityRuntime`) can therefore accept the next notification while
//! earlier fetches are still running.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::IdentityReader;
use crate::domain::foundation::{AuthError, PrincipalId, ProfileLookupError, StateMachine};
use crate::domain::identity::{
    AuthEvent, AuthNotification, IdentityPhase, IdentityState, Profile, ResolvedIdentity, Session,
    SignInCredentials,
};
use crate::ports::{AuthSubscription, ProfileResolver, SessionProvider};

/// What happened to a completed profile fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result was current and moved the snapshot to this phase.
    Applied(IdentityPhase),

    /// A later event superseded the fetch; its result was dropped.
    Discarded,
}

/// Bookkeeping behind the published snapshot.
#[derive(Debug, Default)]
struct Cursor {
    /// Bumped for every accepted notification and every bootstrap start.
    seq: u64,
    principal: Option<PrincipalId>,
    /// Latest session seen for `principal`.
    session: Option<Session>,
    /// Ticket of the fetch currently running for `principal`.
    in_flight: Option<u64>,
}

impl Cursor {
    fn clear(&mut self) {
        self.principal = None;
        self.session = None;
        self.in_flight = None;
    }
}

struct Shared {
    cursor: Mutex<Cursor>,
    state: watch::Sender<IdentityState>,
}

/// Owns the process-wide `IdentityState`.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct IdentityStateMachine {
    provider: Arc<dyn SessionProvider>,
    resolver: Arc<dyn ProfileResolver>,
    shared: Arc<Shared>,
}

impl IdentityStateMachine {
    /// Creates a machine in the initial `Loading` state.
    pub fn new(provider: Arc<dyn SessionProvider>, resolver: Arc<dyn ProfileResolver>) -> Self {
        let (state, _) = watch::channel(IdentityState::initial());
        Self {
            provider,
            resolver,
            shared: Arc::new(Shared {
                cursor: Mutex::new(Cursor::default()),
                state,
            }),
        }
    }

    /// The current snapshot.
    pub fn current(&self) -> IdentityState {
        self.shared.state.borrow().clone()
    }

    /// A read-only handle that observes every published snapshot.
    pub fn reader(&self) -> IdentityReader {
        IdentityReader::new(self.shared.state.subscribe())
    }

    /// Opens a notification subscription on the underlying provider.
    pub fn subscribe_to_provider(&self) -> AuthSubscription {
        self.provider.subscribe()
    }

    // ════════════════════════════════════════════════════════════════════════
    // Commands
    // ════════════════════════════════════════════════════════════════════════

    /// Forwards credentials to the provider.
    ///
    /// Does not touch the snapshot: the provider's `SignedIn` notification
    /// drives the transition.
    pub async fn login(&self, credentials: &SignInCredentials) -> Result<(), AuthError> {
        match self.provider.sign_in_with_credentials(credentials).await {
            Ok(session) => {
                tracing::debug!(principal_id = %session.principal_id(), "sign-in accepted by provider");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "sign-in failed");
                Err(e)
            }
        }
    }

    /// Asks the provider to end the session.
    ///
    /// Like `login`, the snapshot only changes on the resulting notification.
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await.map_err(|e| {
            tracing::warn!(error = %e, "sign-out failed");
            e
        })
    }

    // ════════════════════════════════════════════════════════════════════════
    // Bootstrap
    // ════════════════════════════════════════════════════════════════════════

    /// Registers a bootstrap lookup and returns it, not yet started.
    ///
    /// The lookup is ordered with notifications at the moment of this call:
    /// any notification accepted after it supersedes the lookup's result.
    pub fn begin_bootstrap(&self) -> Bootstrap {
        let mut cursor = self.lock();
        cursor.seq += 1;
        Bootstrap {
            machine: self.clone(),
            ticket: cursor.seq,
        }
    }

    /// Runs the whole bootstrap sequence: session lookup, then profile fetch.
    pub async fn bootstrap(&self) -> Option<FetchOutcome> {
        let fetch = self.begin_bootstrap().run().await?;
        Some(fetch.resolve().await)
    }

    fn complete_bootstrap(
        &self,
        ticket: u64,
        result: Result<Option<Session>, AuthError>,
    ) -> Option<ProfileFetch> {
        let mut cursor = self.lock();
        if cursor.seq != ticket {
            tracing::debug!("bootstrap session lookup superseded by a notification");
            return None;
        }

        match result {
            Ok(Some(session)) => self.accept_session(&mut cursor, session),
            Ok(None) => {
                self.sign_out_locked(&mut cursor);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed during bootstrap");
                self.sign_out_locked(&mut cursor);
                None
            }
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Notifications
    // ════════════════════════════════════════════════════════════════════════

    /// Applies a notification to the snapshot.
    ///
    /// Returns the profile fetch the notification requires, if any. The
    /// caller must run it (see `ProfileFetch::resolve`) for the snapshot to
    /// leave `Loading`.
    pub fn accept(&self, notification: AuthNotification) -> Option<ProfileFetch> {
        let mut cursor = self.lock();
        cursor.seq += 1;

        tracing::debug!(
            event = notification.event.as_str(),
            principal_id = ?notification.principal_id().map(PrincipalId::as_str),
            "auth notification accepted"
        );

        match (notification.event, notification.session) {
            (AuthEvent::SignedOut, _) => {
                self.sign_out_locked(&mut cursor);
                None
            }
            (_, Some(session)) => self.accept_session(&mut cursor, session),
            (AuthEvent::InitialSession, None) => {
                self.sign_out_locked(&mut cursor);
                None
            }
            (event, None) => {
                let loading = self.shared.state.borrow().is_loading();
                if loading {
                    self.sign_out_locked(&mut cursor);
                } else {
                    tracing::warn!(event = event.as_str(), "ignoring notification without a session");
                }
                None
            }
        }
    }

    /// Accepts a notification and runs the fetch it requires to completion.
    pub async fn handle_notification(&self, notification: AuthNotification) -> Option<FetchOutcome> {
        let fetch = self.accept(notification)?;
        Some(fetch.resolve().await)
    }

    fn accept_session(&self, cursor: &mut Cursor, session: Session) -> Option<ProfileFetch> {
        let principal_id = session.principal_id().clone();
        let same_principal = cursor.principal.as_ref() == Some(&principal_id);
        if !same_principal {
            cursor.principal = Some(principal_id.clone());
            cursor.in_flight = None;
        }
        cursor.session = Some(session.clone());

        let current = self.current();
        match current {
            IdentityState::Authenticated(resolved) if same_principal => {
                // Profile already held: swap the session, no refetch.
                if let Some(refreshed) = resolved.refreshed(session) {
                    self.publish(IdentityState::Authenticated(refreshed));
                }
                None
            }
            IdentityState::AuthenticatedNoProfile { .. } if same_principal => {
                // Stays out of Loading: routing keeps its answer while the retry runs.
                self.publish(IdentityState::AuthenticatedNoProfile { session });
                self.issue_fetch(cursor, principal_id)
            }
            _ => {
                self.publish(IdentityState::Loading {
                    pending: Some(session),
                });
                self.issue_fetch(cursor, principal_id)
            }
        }
    }

    fn issue_fetch(&self, cursor: &mut Cursor, principal_id: PrincipalId) -> Option<ProfileFetch> {
        if cursor.in_flight.is_some() {
            tracing::debug!(principal_id = %principal_id, "profile fetch already in flight");
            return None;
        }
        cursor.in_flight = Some(cursor.seq);
        Some(ProfileFetch {
            machine: self.clone(),
            principal_id,
            ticket: cursor.seq,
        })
    }

    fn sign_out_locked(&self, cursor: &mut Cursor) {
        cursor.clear();
        self.publish(IdentityState::Unauthenticated);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Fetch completion
    // ════════════════════════════════════════════════════════════════════════

    fn complete_fetch(
        &self,
        principal_id: &PrincipalId,
        ticket: u64,
        result: Result<Profile, ProfileLookupError>,
    ) -> FetchOutcome {
        let mut cursor = self.lock();
        if cursor.principal.as_ref() != Some(principal_id) || cursor.in_flight != Some(ticket) {
            tracing::debug!(principal_id = %principal_id, ticket, "discarding stale profile fetch");
            return FetchOutcome::Discarded;
        }
        cursor.in_flight = None;

        let Some(session) = cursor.session.clone() else {
            return FetchOutcome::Discarded;
        };

        let next = match result {
            Ok(profile) => match ResolvedIdentity::new(session.clone(), profile) {
                Ok(resolved) => IdentityState::Authenticated(resolved),
                Err(e) => {
                    tracing::warn!(principal_id = %principal_id, error = %e, "resolver returned a foreign profile");
                    IdentityState::AuthenticatedNoProfile { session }
                }
            },
            Err(ProfileLookupError::NotFound) => {
                tracing::info!(principal_id = %principal_id, "principal has no profile");
                IdentityState::AuthenticatedNoProfile { session }
            }
            Err(e) => {
                tracing::warn!(principal_id = %principal_id, error = %e, "profile fetch failed, continuing without profile");
                IdentityState::AuthenticatedNoProfile { session }
            }
        };

        let phase = next.phase();
        self.publish(next);
        FetchOutcome::Applied(phase)
    }

    /// Replaces the snapshot. Callers hold the cursor lock.
    fn publish(&self, next: IdentityState) {
        let previous = self.shared.state.borrow().phase();
        let phase = next.phase();
        if let Err(e) = previous.transition_to(phase) {
            tracing::warn!(
                from = previous.as_str(),
                to = phase.as_str(),
                error = %e,
                "unexpected identity transition"
            );
        }

        tracing::info!(
            phase = phase.as_str(),
            principal_id = ?next.principal().map(|p| p.id.as_str()),
            role = ?next.role().map(|r| r.as_str()),
            "identity state changed"
        );
        self.shared.state.send_replace(next);
    }

    fn lock(&self) -> MutexGuard<'_, Cursor> {
        self.shared.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for IdentityStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityStateMachine")
            .field("phase", &self.shared.state.borrow().phase())
            .finish_non_exhaustive()
    }
}

/// A registered, not yet started, bootstrap session lookup.
#[must_use = "a bootstrap does nothing until run"]
pub struct Bootstrap {
    machine: IdentityStateMachine,
    ticket: u64,
}

impl Bootstrap {
    /// Looks up the provider's current session and applies it, unless a
    /// notification got there first.
    ///
    /// Returns the profile fetch the session requires, if any.
    pub async fn run(self) -> Option<ProfileFetch> {
        let result = self.machine.provider.current_session().await;
        self.machine.complete_bootstrap(self.ticket, result)
    }
}

/// A profile fetch issued by the machine for one principal.
#[must_use = "the snapshot stays in Loading until the fetch is resolved"]
pub struct ProfileFetch {
    machine: IdentityStateMachine,
    principal_id: PrincipalId,
    ticket: u64,
}

impl ProfileFetch {
    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal_id
    }

    /// Runs the lookup and applies its result if it is still current.
    pub async fn resolve(self) -> FetchOutcome {
        let result = self.machine.resolver.fetch_profile(&self.principal_id).await;
        self.machine.complete_fetch(&self.principal_id, self.ticket, result)
    }
}

impl std::fmt::Debug for ProfileFetch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileFetch")
            .field("principal_id", &self.principal_id)
            .field("ticket", &self.ticket)
            .finish()
    }
}
