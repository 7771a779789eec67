//! State shared between the event loop and reconnect calls.
//!
//! Locks are never held across a backend call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, watch};

use threadlive_core::{
    ConnectionState, ConnectionTarget, ConnectionTracker, FocusGate, LiveStatus, LiveSupervisor,
    StalenessDeadline,
};

use crate::backend::{LiveBackend, ThreadRefresher};
use crate::config::LiveConfig;

/// Mutable manager state, mutated between suspension points only.
#[derive(Debug)]
pub(crate) struct Session {
    pub supervisor: LiveSupervisor,
    pub tracker: ConnectionTracker,
    pub gate: FocusGate,
    pub staleness: StalenessDeadline,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Set on unmount; no attempt may begin afterwards.
    pub closed: bool,
}

impl Session {
    pub fn new(config: &LiveConfig) -> Self {
        Self {
            supervisor: LiveSupervisor::new(),
            tracker: ConnectionTracker::new(),
            gate: FocusGate::new(),
            staleness: StalenessDeadline::new(config.staleness_ms()),
            last_heartbeat_at: None,
            closed: false,
        }
    }

    /// Whether `target` is both the selected thread and the wanted channel.
    pub fn is_current(&self, target: &ConnectionTarget) -> bool {
        self.tracker.active() == Some(target) && self.supervisor.is_desired(target)
    }

    pub fn status(&self, config: &LiveConfig, now: DateTime<Utc>) -> LiveStatus {
        let mut status = LiveStatus::idle(config.backend_mode, now);
        status.state = self.tracker.state();
        status.active = self.tracker.active().cloned();
        status.desired = self.supervisor.desired().cloned();
        status.subscribed = self.supervisor.subscribed().into_iter().cloned().collect();
        status.deferred = self.gate.deferred().map(|(_, reason)| reason);
        status.last_heartbeat_at = self.last_heartbeat_at;
        status
    }
}

/// How a reconnect attempt ended, reported back to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptOutcome {
    Applied,
    Stale,
    Failed,
}

#[derive(Debug, Clone)]
pub(crate) struct Completion {
    pub target: ConnectionTarget,
    pub outcome: AttemptOutcome,
}

pub(crate) struct Shared {
    pub config: LiveConfig,
    pub session: Mutex<Session>,
    pub state_tx: watch::Sender<ConnectionState>,
    pub backend: Arc<dyn LiveBackend>,
    pub refresher: Arc<dyn ThreadRefresher>,
    pub completions: mpsc::UnboundedSender<Completion>,
}

impl Shared {
    /// Publish the tracker's state to watchers, only when it changed.
    pub fn publish(&self, state: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }

    pub fn complete(&self, target: ConnectionTarget, outcome: AttemptOutcome) {
        // The loop may already be gone after shutdown.
        let _ = self.completions.send(Completion { target, outcome });
    }
}
