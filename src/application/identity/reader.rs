//! Read-only view of the identity snapshot.

use tokio::sync::watch;

use crate::domain::access::{AccessGate, GateDecision, RoleSet};
use crate::domain::identity::IdentityState;

/// Observes the snapshot published by `IdentityStateMachine`.
///
/// Every read returns a whole snapshot; a reader can never see the principal
/// of one state paired with the profile of another.
#[derive(Debug, Clone)]
pub struct IdentityReader {
    receiver: watch::Receiver<IdentityState>,
}

impl IdentityReader {
    pub(crate) fn new(receiver: watch::Receiver<IdentityState>) -> Self {
        Self { receiver }
    }

    /// The latest snapshot.
    pub fn current(&self) -> IdentityState {
        self.receiver.borrow().clone()
    }

    /// Waits for the next published snapshot.
    ///
    /// Intermediate snapshots may be skipped if several are published before
    /// the reader wakes up. Returns `None` once the machine is gone.
    pub async fn changed(&mut self) -> Option<IdentityState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Waits until the snapshot is no longer `Loading` and returns it.
    ///
    /// Returns `None` if the machine is dropped while still loading.
    pub async fn settled(&mut self) -> Option<IdentityState> {
        let state = self.receiver.wait_for(|state| !state.is_loading()).await.ok()?;
        Some((*state).clone())
    }

    /// Evaluates the gate against the latest snapshot.
    pub fn evaluate(&self, gate: &AccessGate, required: Option<&RoleSet>) -> GateDecision {
        gate.evaluate(&self.receiver.borrow(), required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::PrincipalId;
    use crate::domain::identity::{Principal, Role, Session};

    fn no_profile() -> IdentityState {
        IdentityState::AuthenticatedNoProfile {
            session: Session::new(Principal::new(PrincipalId::new("u2").unwrap()), "t"),
        }
    }

    #[tokio::test]
    async fn current_reflects_latest_snapshot() {
        let (sender, receiver) = watch::channel(IdentityState::initial());
        let reader = IdentityReader::new(receiver);

        sender.send_replace(IdentityState::Unauthenticated);

        assert_eq!(reader.current(), IdentityState::Unauthenticated);
    }

    #[tokio::test]
    async fn changed_yields_next_snapshot_then_none_when_closed() {
        let (sender, receiver) = watch::channel(IdentityState::initial());
        let mut reader = IdentityReader::new(receiver);

        sender.send_replace(IdentityState::Unauthenticated);
        assert_eq!(reader.changed().await, Some(IdentityState::Unauthenticated));

        drop(sender);
        assert_eq!(reader.changed().await, None);
    }

    #[tokio::test]
    async fn settled_waits_out_loading() {
        let (sender, receiver) = watch::channel(IdentityState::initial());
        let mut reader = IdentityReader::new(receiver);

        let waiter = tokio::spawn(async move { reader.settled().await });
        sender.send_replace(IdentityState::Loading { pending: None });
        sender.send_replace(no_profile());

        assert_eq!(waiter.await.unwrap(), Some(no_profile()));
    }

    #[tokio::test]
    async fn settled_returns_immediately_when_steady() {
        let (_sender, receiver) = watch::channel(IdentityState::Unauthenticated);
        let mut reader = IdentityReader::new(receiver);
        assert_eq!(reader.settled().await, Some(IdentityState::Unauthenticated));
    }

    #[test]
    fn evaluate_uses_latest_snapshot() {
        let (sender, receiver) = watch::channel(IdentityState::initial());
        let reader = IdentityReader::new(receiver);
        let gate = AccessGate::default();

        assert_eq!(reader.evaluate(&gate, None), GateDecision::Hold);

        sender.send_replace(no_profile());
        let admin_only = RoleSet::of(&[Role::Admin]);
        assert_eq!(
            reader.evaluate(&gate, Some(&admin_only)),
            GateDecision::RedirectTo("/".to_string())
        );
    }
}
