//! Notification fan-out for session providers.
//!
//! Keeps one unbounded sender per live subscription. Subscriptions that have
//! been dropped are pruned on the next emit.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::domain::identity::AuthNotification;
use crate::ports::AuthSubscription;

/// Delivers every emitted notification to every live subscription.
#[derive(Debug, Default)]
pub struct NotificationFanout {
    senders: Mutex<Vec<mpsc::UnboundedSender<AuthNotification>>>,
}

impl NotificationFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new subscription.
    pub fn subscribe(&self) -> AuthSubscription {
        let (sender, subscription) = AuthSubscription::channel();
        self.lock().push(sender);
        subscription
    }

    /// Opens a new subscription with `first` already queued on it.
    ///
    /// Only the new subscriber sees `first`.
    pub fn subscribe_with(&self, first: AuthNotification) -> AuthSubscription {
        let (sender, subscription) = AuthSubscription::channel();
        if sender.send(first).is_ok() {
            self.lock().push(sender);
        }
        subscription
    }

    /// Emits to all live subscriptions, returning how many received it.
    pub fn emit(&self, notification: AuthNotification) -> usize {
        let mut senders = self.lock();
        senders.retain(|sender| sender.send(notification.clone()).is_ok());
        tracing::debug!(
            event = notification.event.as_str(),
            subscribers = senders.len(),
            "auth notification emitted"
        );
        senders.len()
    }

    /// Number of subscriptions still open as of the last emit.
    pub fn subscriber_count(&self) -> usize {
        let mut senders = self.lock();
        senders.retain(|sender| !sender.is_closed());
        senders.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<AuthNotification>>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_receives_emitted_notification() {
        let fanout = NotificationFanout::new();
        let mut first = fanout.subscribe();
        let mut second = fanout.subscribe();

        assert_eq!(fanout.emit(AuthNotification::signed_out()), 2);

        assert_eq!(first.recv().await, Some(AuthNotification::signed_out()));
        assert_eq!(second.recv().await, Some(AuthNotification::signed_out()));
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let fanout = NotificationFanout::new();
        let kept = fanout.subscribe();
        let dropped = fanout.subscribe();
        drop(dropped);

        assert_eq!(fanout.emit(AuthNotification::signed_out()), 1);
        assert_eq!(fanout.subscriber_count(), 1);
        drop(kept);
        assert_eq!(fanout.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribe_with_queues_first_notification_for_new_subscriber_only() {
        let fanout = NotificationFanout::new();
        let mut existing = fanout.subscribe();
        let mut fresh = fanout.subscribe_with(AuthNotification::initial_session(None));

        assert_eq!(fresh.recv().await, Some(AuthNotification::initial_session(None)));
        assert!(existing.try_recv().is_none());
    }
}
