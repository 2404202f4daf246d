//! IdentityRuntime - background driver for the identity state machine.
//!
//! Owns the provider subscription for the lifetime of the process:
//!
//! 1. Subscribes to the provider (before bootstrapping, so nothing is missed)
//! 2. Registers and spawns the bootstrap lookup
//! 3. Accepts notifications one at a time, spawning the fetches they require
//!
//! ## Graceful Shutdown
//!
//! `shutdown` stops the loop, releases the subscription and aborts every
//! fetch still running. The snapshot keeps its last value.

use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

use super::{IdentityReader, IdentityStateMachine};
use crate::ports::AuthSubscription;

/// Handle to the running identity driver.
pub struct IdentityRuntime {
    machine: IdentityStateMachine,
    shutdown: watch::Sender<bool>,
    driver: JoinHandle<()>,
}

impl IdentityRuntime {
    /// Subscribes, bootstraps and starts driving `machine`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(machine: IdentityStateMachine) -> Self {
        let subscription = machine.subscribe_to_provider();
        let bootstrap = machine.begin_bootstrap();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut fetches = JoinSet::new();
        fetches.spawn(async move {
            if let Some(fetch) = bootstrap.run().await {
                fetch.resolve().await;
            }
        });

        let driver = tokio::spawn(drive(machine.clone(), subscription, fetches, shutdown_rx));
        tracing::info!("identity runtime started");

        Self {
            machine,
            shutdown,
            driver,
        }
    }

    pub fn machine(&self) -> &IdentityStateMachine {
        &self.machine
    }

    pub fn reader(&self) -> IdentityReader {
        self.machine.reader()
    }

    /// Stops the driver and waits for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.driver.await {
            tracing::error!(error = %e, "identity driver task failed");
        }
        tracing::info!("identity runtime stopped");
    }
}

impl std::fmt::Debug for IdentityRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityRuntime")
            .field("machine", &self.machine)
            .field("running", &!self.driver.is_finished())
            .finish()
    }
}

async fn drive(
    machine: IdentityStateMachine,
    mut subscription: AuthSubscription,
    mut fetches: JoinSet<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut feed_open = true;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }

            notification = subscription.recv(), if feed_open => {
                match notification {
                    Some(notification) => {
                        if let Some(fetch) = machine.accept(notification) {
                            fetches.spawn(async move {
                                fetch.resolve().await;
                            });
                        }
                    }
                    None => {
                        tracing::warn!("session provider closed the notification feed");
                        feed_open = false;
                    }
                }
            }

            Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!(error = %e, "profile fetch task panicked");
                    }
                }
            }
        }
    }

    subscription.unsubscribe();
    fetches.abort_all();
}
