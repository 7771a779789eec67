//! Generation-guarded reconnects of the live channel.
//!
//! A reconnect is split in two: [`Reconnector::begin`] stamps the attempt and
//! makes its target desired without suspending, and [`PendingReconnect::run`]
//! awaits the subscribe call and applies, ignores, or cleans up its result.
//! Callers that need ordering (the event loop) begin synchronously and spawn
//! the rest.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use threadlive_core::{Attempt, ConnectionTarget, ReconnectOptions, Settlement};

use crate::session::{AttemptOutcome, Shared};

#[derive(Clone)]
pub struct Reconnector {
    shared: Arc<Shared>,
}

/// A started attempt whose subscribe call has not been issued yet.
pub struct PendingReconnect {
    reconnector: Reconnector,
    attempt: Attempt,
}

impl Reconnector {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Subscribe the live channel for `(workspace_id, thread_id)`.
    ///
    /// Resolves `true` only when this attempt is still the latest one for a
    /// still-desired target once the subscribe call returns. Never fails:
    /// backend errors resolve `false`.
    pub async fn reconnect_live(
        &self,
        workspace_id: &str,
        thread_id: &str,
        options: ReconnectOptions,
    ) -> bool {
        match ConnectionTarget::new(workspace_id, thread_id) {
            Ok(target) => self.reconnect_target(target, options).await,
            Err(e) => {
                warn!(workspace_id, thread_id, "live reconnect skipped: {e}");
                false
            }
        }
    }

    pub async fn reconnect_target(&self, target: ConnectionTarget, options: ReconnectOptions) -> bool {
        match self.begin(target).await {
            Some(pending) => pending.run(options).await,
            None => false,
        }
    }

    /// Stamp a new attempt for `target` and make it the desired target.
    ///
    /// Returns `None` when the backend mode has no live channel or the
    /// connection manager was unmounted.
    pub async fn begin(&self, target: ConnectionTarget) -> Option<PendingReconnect> {
        if !self.shared.config.backend_mode.uses_live_channel() {
            debug!(target = %target, mode = %self.shared.config.backend_mode, "live reconnect skipped: no live channel in this mode");
            return None;
        }

        let begun = {
            let mut session = self.shared.session.lock().await;
            if session.closed {
                debug!(target = %target, "live reconnect skipped: connection unmounted");
                return None;
            }
            session.supervisor.begin(target)
        };
        debug!(
            target = %begun.attempt.target,
            generation = begun.attempt.generation,
            "live reconnect started"
        );
        for superseded in begun.release {
            self.spawn_release(superseded);
        }
        Some(PendingReconnect {
            reconnector: self.clone(),
            attempt: begun.attempt,
        })
    }

    /// Release `target` in the background.
    pub(crate) fn spawn_release(&self, target: ConnectionTarget) {
        let this = self.clone();
        tokio::spawn(async move {
            this.release(&target).await;
        });
    }

    /// Best-effort unsubscribe, bounded by the unsubscribe timeout.
    pub(crate) async fn release(&self, target: &ConnectionTarget) {
        self.release_within(target, self.shared.config.unsubscribe_timeout)
            .await;
    }

    /// Best-effort unsubscribe of a stale channel, bounded by the teardown timeout.
    pub(crate) async fn teardown(&self, target: &ConnectionTarget) {
        self.release_within(target, self.shared.config.teardown_timeout)
            .await;
    }

    async fn release_within(&self, target: &ConnectionTarget, timeout: Duration) {
        match tokio::time::timeout(timeout, self.shared.backend.unsubscribe(target)).await {
            Ok(Ok(())) => debug!(target = %target, "live channel released"),
            Ok(Err(e)) => warn!(target = %target, "live unsubscribe failed: {e}"),
            Err(_) => warn!(target = %target, ?timeout, "live unsubscribe timed out"),
        }
    }
}

impl PendingReconnect {
    /// Issue the subscribe call and settle the attempt.
    pub async fn run(self, options: ReconnectOptions) -> bool {
        let shared = &self.reconnector.shared;
        let target = self.attempt.target.clone();

        let result = shared.backend.subscribe(&target).await;
        let settlement = {
            let mut session = shared.session.lock().await;
            let settlement = session.supervisor.settle(&self.attempt, result.is_ok());
            if settlement == Settlement::Authoritative {
                // Not live until traffic proves it.
                session.tracker.reset();
                shared.publish(session.tracker.state());
            }
            settlement
        };

        match settlement {
            Settlement::Authoritative => {
                info!(
                    target = %target,
                    generation = self.attempt.generation,
                    "live channel subscribed"
                );
                if options.run_resume {
                    if let Err(e) = shared.backend.resume(&target).await {
                        warn!(target = %target, "thread resume failed: {e}");
                    }
                }
                if let Err(e) = shared.refresher.refresh(&target).await {
                    warn!(target = %target, "thread refresh failed: {e}");
                }
                shared.complete(target, AttemptOutcome::Applied);
                true
            }
            Settlement::Superseded => {
                debug!(
                    target = %target,
                    generation = self.attempt.generation,
                    "stale live subscribe kept: target still owned"
                );
                shared.complete(target, AttemptOutcome::Stale);
                false
            }
            Settlement::Release => {
                if let Err(e) = &result {
                    warn!(target = %target, "live subscribe failed: {e}");
                }
                debug!(
                    target = %target,
                    generation = self.attempt.generation,
                    "stale live subscribe released"
                );
                self.reconnector.release(&target).await;
                shared.complete(target, AttemptOutcome::Stale);
                false
            }
            Settlement::Failed => {
                if let Err(e) = result {
                    warn!(target = %target, "live subscribe failed: {e}");
                }
                shared.complete(target, AttemptOutcome::Failed);
                false
            }
        }
    }
}
