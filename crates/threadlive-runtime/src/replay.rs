//! Scripted replay of a connection manager session.
//!
//! A scenario is a JSON document of steps (selections, raw bus events, focus
//! transitions, sleeps, explicit reconnects). It runs against a backend that
//! records every call, which makes reconnect behavior inspectable without a
//! real transport.

use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use threadlive_core::{
    BackendMode, ConnectionTarget, FocusTransition, Foreground, LiveStatus, ReconnectOptions,
    Selection,
};

use crate::backend::{LiveBackend, RpcError, ThreadRefresher};
use crate::config::LiveConfig;
use crate::connection::{LiveDeps, spawn_live_connection};
use crate::environment::SharedEnvironment;
use crate::event_bus::EventBus;

// ─── Scenario ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    /// Overrides the configured backend mode.
    #[serde(default)]
    pub mode: Option<BackendMode>,
    /// Overrides the configured staleness threshold.
    #[serde(default)]
    pub staleness_ms: Option<u64>,
    #[serde(default = "foregrounded")]
    pub foreground: Foreground,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn foregrounded() -> Foreground {
    Foreground {
        visible: true,
        focused: true,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    Select(Selection),
    /// Raw server event, published on the bus unchanged.
    Event(Value),
    Focus(FocusTransition),
    SleepMs(u64),
    #[serde(rename_all = "camelCase")]
    Reconnect {
        workspace_id: String,
        thread_id: String,
        #[serde(default)]
        run_resume: bool,
    },
    /// Fail the next N subscribe calls.
    FailSubscribes(u32),
    /// Fail the next N unsubscribe calls.
    FailUnsubscribes(u32),
}

impl Scenario {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// `base` with this scenario's overrides applied.
    pub fn config(&self, base: &LiveConfig) -> LiveConfig {
        let mut config = match self.mode {
            Some(mode) => base.clone().with_backend_mode(mode),
            None => base.clone(),
        };
        if let Some(ms) = self.staleness_ms {
            config.staleness_threshold = Duration::from_millis(ms.max(1));
        }
        config
    }
}

// ─── Scripted backend ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub at: DateTime<Utc>,
    pub call: String,
    pub target: ConnectionTarget,
    pub ok: bool,
}

/// Backend and refresher that succeed unless told to fail, recording each call.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    transcript: StdMutex<Vec<TranscriptEntry>>,
    failing_subscribes: AtomicU32,
    failing_unsubscribes: AtomicU32,
}

impl ScriptedBackend {
    pub fn fail_next_subscribes(&self, count: u32) {
        self.failing_subscribes.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_unsubscribes(&self, count: u32) {
        self.failing_unsubscribes.store(count, Ordering::SeqCst);
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        match self.transcript.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, call: &str, target: &ConnectionTarget, ok: bool) {
        let entry = TranscriptEntry {
            at: Utc::now(),
            call: call.to_string(),
            target: target.clone(),
            ok,
        };
        match self.transcript.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }

    fn take_failure(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LiveBackend for ScriptedBackend {
    async fn subscribe(&self, target: &ConnectionTarget) -> Result<(), RpcError> {
        let fail = Self::take_failure(&self.failing_subscribes);
        self.record("subscribe", target, !fail);
        if fail {
            return Err(RpcError::Transport("scripted subscribe failure".to_string()));
        }
        Ok(())
    }

    async fn unsubscribe(&self, target: &ConnectionTarget) -> Result<(), RpcError> {
        let fail = Self::take_failure(&self.failing_unsubscribes);
        self.record("unsubscribe", target, !fail);
        if fail {
            return Err(RpcError::Transport("scripted unsubscribe failure".to_string()));
        }
        Ok(())
    }

    async fn resume(&self, target: &ConnectionTarget) -> Result<(), RpcError> {
        self.record("resume", target, true);
        Ok(())
    }
}

#[async_trait]
impl ThreadRefresher for ScriptedBackend {
    async fn refresh(&self, target: &ConnectionTarget) -> Result<(), RpcError> {
        self.record("refresh", target, true);
        Ok(())
    }
}

// ─── Runner ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub transcript: Vec<TranscriptEntry>,
    /// Result of every `reconnect` step, in order.
    pub reconnects: Vec<bool>,
    /// Status right before unmount.
    pub status: LiveStatus,
}

/// Run `scenario` to completion, then unmount.
pub async fn run_scenario(scenario: &Scenario, base: &LiveConfig) -> anyhow::Result<ReplayReport> {
    let config = scenario.config(base);
    info!(
        mode = %config.backend_mode,
        staleness_ms = config.staleness_ms(),
        steps = scenario.steps.len(),
        "replaying scenario"
    );

    let backend = Arc::new(ScriptedBackend::default());
    let environment = Arc::new(SharedEnvironment::new(
        scenario.foreground.visible,
        scenario.foreground.focused,
    ));
    let bus = EventBus::default();
    let deps = LiveDeps {
        backend: backend.clone(),
        refresher: backend.clone(),
        environment: environment.clone(),
    };
    let (handle, join) = spawn_live_connection(config, deps, bus.subscribe(), Selection::default());

    let mut reconnects = Vec::new();
    for (index, step) in scenario.steps.iter().enumerate() {
        debug!(index, ?step, "replay step");
        match step {
            Step::Select(selection) => handle.select(selection.clone()),
            Step::Event(raw) => {
                bus.publish(raw.clone());
            }
            Step::Focus(transition) => {
                environment.apply(*transition);
                handle.focus_changed(*transition);
            }
            Step::SleepMs(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Reconnect {
                workspace_id,
                thread_id,
                run_resume,
            } => {
                let options = ReconnectOptions {
                    run_resume: *run_resume,
                };
                reconnects.push(handle.reconnect_live(workspace_id, thread_id, options).await);
            }
            Step::FailSubscribes(count) => backend.fail_next_subscribes(*count),
            Step::FailUnsubscribes(count) => backend.fail_next_unsubscribes(*count),
        }
        drain().await;
    }

    let status = handle.status().await;
    handle.shutdown();
    join.await.context("live connection task panicked")?;

    Ok(ReplayReport {
        transcript: backend.transcript(),
        reconnects,
        status,
    })
}

/// Give the event loop and spawned reconnects a chance to run.
async fn drain() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
