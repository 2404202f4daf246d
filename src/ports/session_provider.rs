//! Session provider port.
//!
//! The session provider is the remote identity service. It owns sessions;
//! the identity core only reads them and reacts to its notifications.
//!
//! # Ordering
//!
//! No ordering is promised between the result of `current_session` and the
//! first notification delivered to a subscription. Both may arrive, in either
//! order, describing the same or different sessions. Consumers must reconcile
//! them (see `IdentityStateMachine`).

use async_trait::async_trait;
use futures::stream::{self, Stream};
use tokio::sync::mpsc;

use crate::domain::foundation::AuthError;
use crate::domain::identity::{AuthNotification, Session, SignInCredentials};

/// Remote identity/session service.
///
/// # Contract
///
/// Implementations must:
/// - Return `Ok(None)` from `current_session` when nobody is signed in
/// - Return `AuthError::InvalidCredentials` for a rejected identifier/secret pair
/// - Return `AuthError::Provider` for transport or backend failures
/// - Treat `sign_out` without a session as a successful no-op
/// - Deliver a `SignedIn` / `SignedOut` notification to every live
///   subscription after a successful `sign_in_with_credentials` / `sign_out`
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolves the session the provider currently holds.
    async fn current_session(&self) -> Result<Option<Session>, AuthError>;

    /// Signs in with an email/password pair.
    async fn sign_in_with_credentials(
        &self,
        credentials: &SignInCredentials,
    ) -> Result<Session, AuthError>;

    /// Invalidates the current session. Idempotent.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Registers for lifecycle notifications.
    ///
    /// Dropping the returned subscription unsubscribes.
    fn subscribe(&self) -> AuthSubscription;
}

/// Receiving end of a provider's notification feed.
#[derive(Debug)]
pub struct AuthSubscription {
    receiver: mpsc::UnboundedReceiver<AuthNotification>,
}

impl AuthSubscription {
    /// Creates a connected sender/subscription pair.
    pub fn channel() -> (mpsc::UnboundedSender<AuthNotification>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }

    /// Waits for the next notification.
    ///
    /// Returns `None` once the provider has dropped its side of the feed.
    pub async fn recv(&mut self) -> Option<AuthNotification> {
        self.receiver.recv().await
    }

    /// Returns a notification if one is already queued.
    pub fn try_recv(&mut self) -> Option<AuthNotification> {
        self.receiver.try_recv().ok()
    }

    /// Stops the feed. Notifications already queued are discarded.
    pub fn unsubscribe(mut self) {
        self.receiver.close();
    }

    /// Adapts the subscription into a `Stream` of notifications.
    pub fn into_stream(self) -> impl Stream<Item = AuthNotification> + Send {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|notification| (notification, subscription))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn subscription_receives_notifications_in_order() {
        let (sender, mut subscription) = AuthSubscription::channel();

        sender.send(AuthNotification::signed_out()).unwrap();
        sender.send(AuthNotification::initial_session(None)).unwrap();

        assert_eq!(subscription.recv().await, Some(AuthNotification::signed_out()));
        assert_eq!(
            subscription.recv().await,
            Some(AuthNotification::initial_session(None))
        );
    }

    #[tokio::test]
    async fn subscription_ends_when_sender_dropped() {
        let (sender, mut subscription) = AuthSubscription::channel();
        drop(sender);
        assert_eq!(subscription.recv().await, None);
    }

    #[test]
    fn unsubscribe_closes_the_feed() {
        let (sender, subscription) = AuthSubscription::channel();
        subscription.unsubscribe();
        assert!(sender.send(AuthNotification::signed_out()).is_err());
    }

    #[tokio::test]
    async fn into_stream_yields_until_closed() {
        let (sender, subscription) = AuthSubscription::channel();
        sender.send(AuthNotification::signed_out()).unwrap();
        drop(sender);

        let collected: Vec<_> = subscription.into_stream().collect().await;
        assert_eq!(collected, vec![AuthNotification::signed_out()]);
    }

    #[test]
    fn session_provider_trait_is_object_safe_and_send_sync() {
        fn _assert_trait_object(_: &dyn SessionProvider) {}
        fn _assert_arc_send_sync<T: Send + Sync + ?Sized>() {}
        _assert_arc_send_sync::<std::sync::Arc<dyn SessionProvider>>();
    }
}
