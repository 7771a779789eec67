//! Orchestration shell: one event loop per mounted connection manager.
//!
//! The loop owns every trigger that can start or cancel a reconnect:
//! selection changes, bus events, focus transitions, the staleness timer and
//! completions of earlier attempts. Handlers run to completion between
//! `select!` wakeups; backend calls are spawned so the loop never waits on
//! the network.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use threadlive_core::{
    ConnectionState, ConnectionTarget, DetachDecision, FocusTransition, LiveStatus,
    ReconnectOptions, Selection, TrackerSignal, classify,
};

use crate::backend::{LiveBackend, ThreadRefresher};
use crate::config::LiveConfig;
use crate::environment::Environment;
use crate::reconnector::Reconnector;
use crate::session::{AttemptOutcome, Completion, Session, Shared};

/// Collaborators the connection manager drives.
#[derive(Clone)]
pub struct LiveDeps {
    pub backend: Arc<dyn LiveBackend>,
    pub refresher: Arc<dyn ThreadRefresher>,
    pub environment: Arc<dyn Environment>,
}

#[derive(Debug)]
enum Command {
    Select(Selection),
    Focus(FocusTransition),
}

/// Cloneable handle to a running connection manager.
#[derive(Clone)]
pub struct LiveConnectionHandle {
    shared: Arc<Shared>,
    reconnector: Reconnector,
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
}

impl LiveConnectionHandle {
    /// Current connection state of the active thread.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// See [`Reconnector::reconnect_live`].
    pub async fn reconnect_live(
        &self,
        workspace_id: &str,
        thread_id: &str,
        options: ReconnectOptions,
    ) -> bool {
        self.reconnector
            .reconnect_live(workspace_id, thread_id, options)
            .await
    }

    /// Change the active workspace/thread.
    pub fn select(&self, selection: Selection) {
        self.send(Command::Select(selection));
    }

    /// Report a window focus or document visibility transition.
    ///
    /// The injected [`Environment`] must already reflect it.
    pub fn focus_changed(&self, transition: FocusTransition) {
        self.send(Command::Focus(transition));
    }

    pub async fn status(&self) -> LiveStatus {
        let session = self.shared.session.lock().await;
        session.status(&self.shared.config, Utc::now())
    }

    /// Unmount: stop the loop and release held subscriptions.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("live connection already stopped; command dropped");
        }
    }
}

/// Mount a connection manager for `initial` and start its event loop.
pub fn spawn_live_connection(
    config: LiveConfig,
    deps: LiveDeps,
    events: broadcast::Receiver<Value>,
    initial: Selection,
) -> (LiveConnectionHandle, JoinHandle<()>) {
    let (state_tx, state_rx) = watch::channel(ConnectionState::Polling);
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let shared = Arc::new(Shared {
        session: Mutex::new(Session::new(&config)),
        config,
        state_tx,
        backend: deps.backend,
        refresher: deps.refresher,
        completions: completions_tx,
    });
    let reconnector = Reconnector::new(Arc::clone(&shared));

    let handle = LiveConnectionHandle {
        shared: Arc::clone(&shared),
        reconnector: reconnector.clone(),
        commands: commands_tx,
        state_rx,
        cancel: cancel.clone(),
    };

    let event_loop = LiveConnection {
        shared,
        reconnector,
        environment: deps.environment,
        events,
        events_open: true,
        commands: commands_rx,
        completions: completions_rx,
        cancel,
        epoch: Instant::now(),
    };
    let join = tokio::spawn(event_loop.run(initial));
    (handle, join)
}

struct LiveConnection {
    shared: Arc<Shared>,
    reconnector: Reconnector,
    environment: Arc<dyn Environment>,
    events: broadcast::Receiver<Value>,
    events_open: bool,
    commands: mpsc::UnboundedReceiver<Command>,
    completions: mpsc::UnboundedReceiver<Completion>,
    cancel: CancellationToken,
    /// Zero point of the millisecond clock fed to the staleness deadline.
    epoch: Instant,
}

impl LiveConnection {
    async fn run(mut self, initial: Selection) {
        info!(mode = %self.shared.config.backend_mode, "live connection mounted");
        self.select(initial).await;

        loop {
            let deadline = self.staleness_deadline().await;
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(Command::Select(selection)) => self.select(selection).await,
                    Some(Command::Focus(transition)) => self.focus(transition).await,
                    None => break,
                },
                Some(completion) = self.completions.recv() => self.completed(completion).await,
                event = self.events.recv(), if self.events_open => match event {
                    Ok(raw) => self.event(&raw).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "live connection lagged behind the event bus");
                    }
                    Err(RecvError::Closed) => {
                        info!("event bus closed; live events no longer observed");
                        self.events_open = false;
                    }
                },
                () = sleep_until_or_pending(deadline) => self.expired().await,
            }
        }

        self.unmount().await;
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    async fn staleness_deadline(&self) -> Option<Instant> {
        let session = self.shared.session.lock().await;
        session
            .staleness
            .deadline_ms()
            .map(|ms| self.epoch + Duration::from_millis(ms))
    }

    fn live_channel(&self) -> bool {
        self.shared.config.backend_mode.uses_live_channel()
    }

    /// Start a reconnect now and let it finish in the background.
    async fn spawn_reconnect(&self, target: ConnectionTarget, options: ReconnectOptions) {
        if let Some(pending) = self.reconnector.begin(target).await {
            tokio::spawn(pending.run(options));
        }
    }

    async fn select(&mut self, selection: Selection) {
        let target = selection.target();
        let releases = {
            let mut session = self.shared.session.lock().await;
            if session.tracker.active() == target.as_ref()
                && (target.is_none() || session.supervisor.desired().is_some())
            {
                return;
            }
            session.tracker.select(target.clone());
            session.gate.clear();
            session.staleness.disarm();
            session.last_heartbeat_at = None;
            self.shared.publish(session.tracker.state());
            if target.is_none() {
                session.supervisor.clear()
            } else {
                Vec::new()
            }
        };
        for released in releases {
            self.reconnector.spawn_release(released);
        }

        match target {
            Some(target) if self.live_channel() => {
                info!(target = %target, "active thread selected");
                self.spawn_reconnect(target, ReconnectOptions::PLAIN).await;
            }
            Some(target) => debug!(target = %target, "active thread selected (no live channel)"),
            None => debug!("no active thread"),
        }
    }

    async fn event(&mut self, raw: &Value) {
        if !self.live_channel() {
            return;
        }
        let Some(event) = classify(raw) else {
            return;
        };

        let mut session = self.shared.session.lock().await;
        let signal = session.tracker.observe(&event);
        let Some(active) = session.tracker.active().cloned() else {
            return;
        };
        match signal {
            TrackerSignal::Heartbeat { promoted } => {
                let now_ms = self.now_ms();
                session.staleness.heartbeat(&active, now_ms);
                session.last_heartbeat_at = Some(Utc::now());
                if promoted {
                    info!(target = %active, "live channel confirmed by heartbeat");
                    self.shared.publish(session.tracker.state());
                }
            }
            TrackerSignal::Activity { promoted } => {
                if promoted {
                    info!(target = %active, method = %event.method, "live channel confirmed by activity");
                    self.shared.publish(session.tracker.state());
                }
            }
            TrackerSignal::Detached => {
                let env = self.environment.foreground();
                let decision = session.gate.on_detach(&active, env);
                match decision {
                    DetachDecision::ReconnectNow => {
                        info!(target = %active, "live channel detached; reconnecting");
                        session.tracker.reset();
                        session.staleness.disarm();
                        self.shared.publish(session.tracker.state());
                        drop(session);
                        self.spawn_reconnect(active, ReconnectOptions::RESUME).await;
                    }
                    DetachDecision::Deferred => {
                        debug!(target = %active, ?env, "live channel detached in background; deferring");
                    }
                }
            }
            TrackerSignal::Ignored => {}
        }
    }

    async fn focus(&mut self, transition: FocusTransition) {
        if !self.live_channel() {
            return;
        }
        let env = self.environment.foreground();
        let mut session = self.shared.session.lock().await;

        if !transition.is_regain() {
            if let Some(abandoned) = session.supervisor.abandon_pending() {
                info!(target = %abandoned, ?transition, "in-flight live subscribe abandoned");
                if session.tracker.active() == Some(&abandoned) {
                    session.gate.on_abandoned(&abandoned);
                    session.staleness.disarm();
                }
            }
            return;
        }

        let Some((target, reason)) = session.gate.on_regain(env) else {
            return;
        };
        if session.tracker.active() != Some(&target) {
            return;
        }
        info!(target = %target, ?reason, "window foregrounded; reconnecting live channel");
        drop(session);
        self.spawn_reconnect(target, ReconnectOptions::RESUME).await;
    }

    async fn completed(&mut self, completion: Completion) {
        if completion.outcome == AttemptOutcome::Stale {
            return;
        }
        let now_ms = self.now_ms();
        let mut session = self.shared.session.lock().await;
        if session.is_current(&completion.target) {
            session.staleness.arm(completion.target, now_ms);
        }
    }

    async fn expired(&mut self) {
        let now_ms = self.now_ms();
        let mut session = self.shared.session.lock().await;
        let Some(target) = session.staleness.poll_expired(now_ms) else {
            return;
        };
        if !session.is_current(&target) {
            return;
        }

        warn!(target = %target, threshold_ms = session.staleness.threshold_ms(), "live channel stale; resubscribing");
        session.tracker.reset();
        self.shared.publish(session.tracker.state());
        session.supervisor.forget(&target);
        drop(session);

        // The resubscribe is issued only after the teardown resolved, failed
        // or hit the teardown timeout, so the backend never drops the fresh
        // channel. Teardown failures never cancel the resubscribe.
        if let Some(pending) = self.reconnector.begin(target.clone()).await {
            let reconnector = self.reconnector.clone();
            tokio::spawn(async move {
                reconnector.teardown(&target).await;
                pending.run(ReconnectOptions::RESUME).await;
            });
        }
    }

    async fn unmount(&mut self) {
        let releases = {
            let mut session = self.shared.session.lock().await;
            session.closed = true;
            session.tracker.select(None);
            session.gate.clear();
            session.staleness.disarm();
            self.shared.publish(session.tracker.state());
            session.supervisor.clear()
        };
        for released in &releases {
            self.reconnector.release(released).await;
        }
        info!(released = releases.len(), "live connection unmounted");
    }
}

async fn sleep_until_or_pending(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ─── Tests ────────────────────────────────────────────────────────
