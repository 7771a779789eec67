//! Connection state tracker for the active thread.
//!
//! `polling` is the initial state and the state after every fresh subscribe.
//! Only traffic observed for the active thread promotes it to `live`; a
//! successful subscribe call alone never does.

use crate::classify::{ClassifiedEvent, EventKind};
use crate::types::{ConnectionState, ConnectionTarget};

/// What an inbound event meant for the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerSignal {
    /// Heartbeat for the active thread: reset the staleness deadline.
    Heartbeat { promoted: bool },
    /// Non-heartbeat traffic for the active thread.
    Activity { promoted: bool },
    /// The server tore down the active thread's channel.
    Detached,
    /// Not about the active thread.
    Ignored,
}

impl TrackerSignal {
    pub fn promoted(self) -> bool {
        matches!(
            self,
            Self::Heartbeat { promoted: true } | Self::Activity { promoted: true }
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionTracker {
    active: Option<ConnectionTarget>,
    state: ConnectionState,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn active(&self) -> Option<&ConnectionTarget> {
        self.active.as_ref()
    }

    /// Re-arm for a new active thread. State for the previous thread is discarded.
    pub fn select(&mut self, target: Option<ConnectionTarget>) {
        self.active = target;
        self.state = ConnectionState::Polling;
    }

    /// Back to `polling` after a fresh subscribe or a detach.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Polling;
    }

    /// Apply an inbound event.
    pub fn observe(&mut self, event: &ClassifiedEvent) -> TrackerSignal {
        let Some(active) = &self.active else {
            return TrackerSignal::Ignored;
        };
        if !active.matches(&event.workspace_id, event.thread_id()) {
            return TrackerSignal::Ignored;
        }

        match event.kind() {
            EventKind::Detached => TrackerSignal::Detached,
            EventKind::Heartbeat => TrackerSignal::Heartbeat {
                promoted: self.promote(),
            },
            EventKind::Activity => TrackerSignal::Activity {
                promoted: self.promote(),
            },
        }
    }

    fn promote(&mut self) -> bool {
        if self.state == ConnectionState::Live {
            return false;
        }
        self.state = ConnectionState::Live;
        true
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(workspace: &str, method: &str, thread: &str) -> ClassifiedEvent {
        ClassifiedEvent {
            workspace_id: workspace.to_string(),
            method: method.to_string(),
            params: json!({ "threadId": thread }),
        }
    }

    fn tracker_for(thread: &str) -> ConnectionTracker {
        let mut tracker = ConnectionTracker::new();
        tracker.select(Some(ConnectionTarget::new("ws-1", thread).expect("valid")));
        tracker
    }

    #[test]
    fn starts_polling() {
        let tracker = tracker_for("thread-1");
        assert_eq!(tracker.state(), ConnectionState::Polling);
    }

    #[test]
    fn activity_promotes_without_heartbeat() {
        let mut tracker = tracker_for("thread-1");
        let signal = tracker.observe(&event("ws-1", "item/started", "thread-1"));
        assert_eq!(signal, TrackerSignal::Activity { promoted: true });
        assert_eq!(tracker.state(), ConnectionState::Live);
    }

    #[test]
    fn heartbeat_when_live_is_not_a_promotion() {
        let mut tracker = tracker_for("thread-1");
        assert!(
            tracker
                .observe(&event("ws-1", "thread/live_heartbeat", "thread-1"))
                .promoted()
        );
        let again = tracker.observe(&event("ws-1", "thread/live_heartbeat", "thread-1"));
        assert_eq!(again, TrackerSignal::Heartbeat { promoted: false });
        assert_eq!(tracker.state(), ConnectionState::Live);
    }

    #[test]
    fn other_thread_or_workspace_is_ignored() {
        let mut tracker = tracker_for("thread-1");
        assert_eq!(
            tracker.observe(&event("ws-1", "item/started", "thread-2")),
            TrackerSignal::Ignored
        );
        assert_eq!(
            tracker.observe(&event("ws-2", "item/started", "thread-1")),
            TrackerSignal::Ignored
        );
        assert_eq!(tracker.state(), ConnectionState::Polling);
    }

    #[test]
    fn detach_is_reported_without_state_change() {
        let mut tracker = tracker_for("thread-1");
        tracker.observe(&event("ws-1", "item/started", "thread-1"));
        assert_eq!(
            tracker.observe(&event("ws-1", "thread/live_detached", "thread-1")),
            TrackerSignal::Detached
        );
        assert_eq!(tracker.state(), ConnectionState::Live);
    }

    #[test]
    fn reselect_resets_to_polling() {
        let mut tracker = tracker_for("thread-1");
        tracker.observe(&event("ws-1", "item/started", "thread-1"));
        tracker.select(Some(ConnectionTarget::new("ws-1", "thread-1").expect("valid")));
        assert_eq!(tracker.state(), ConnectionState::Polling);
    }

    #[test]
    fn nothing_selected_ignores_everything() {
        let mut tracker = ConnectionTracker::new();
        assert_eq!(
            tracker.observe(&event("ws-1", "item/started", "thread-1")),
            TrackerSignal::Ignored
        );
    }
}
