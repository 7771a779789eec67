//! Focus/visibility gate for reconnect triggers.
//!
//! A detach is acted on only while the window is visible and focused.
//! Otherwise the reconnect is deferred until the window is foregrounded
//! again. A blur while an attempt is in flight also defers: the attempt
//! is abandoned and picked up again on focus regain.

use serde::{Deserialize, Serialize};

use crate::types::ConnectionTarget;

/// Snapshot of the environment at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Foreground {
    pub visible: bool,
    pub focused: bool,
}

impl Foreground {
    pub fn is_foreground(self) -> bool {
        self.visible && self.focused
    }
}

/// Window/document transition delivered by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FocusTransition {
    Focus,
    Blur,
    Visible,
    Hidden,
}

impl FocusTransition {
    pub fn is_regain(self) -> bool {
        matches!(self, Self::Focus | Self::Visible)
    }
}

/// Why a reconnect is waiting for the foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferReason {
    Detached,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetachDecision {
    ReconnectNow,
    Deferred,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusGate {
    deferred: Option<(ConnectionTarget, DeferReason)>,
}

impl FocusGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deferred(&self) -> Option<(&ConnectionTarget, DeferReason)> {
        self.deferred
            .as_ref()
            .map(|(target, reason)| (target, *reason))
    }

    /// A detach arrived for `target`.
    pub fn on_detach(&mut self, target: &ConnectionTarget, env: Foreground) -> DetachDecision {
        if env.is_foreground() {
            self.deferred = None;
            DetachDecision::ReconnectNow
        } else {
            self.deferred = Some((target.clone(), DeferReason::Detached));
            DetachDecision::Deferred
        }
    }

    /// The in-flight attempt for `target` was abandoned on blur.
    pub fn on_abandoned(&mut self, target: &ConnectionTarget) {
        // A deferred detach already implies a reconnect; keep its reason.
        if self.deferred.is_none() {
            self.deferred = Some((target.clone(), DeferReason::Abandoned));
        }
    }

    /// Handle a regain transition. Returns the target to reconnect, if any.
    pub fn on_regain(&mut self, env: Foreground) -> Option<(ConnectionTarget, DeferReason)> {
        if !env.is_foreground() {
            return None;
        }
        self.deferred.take()
    }

    /// Forget everything, e.g. when the active thread changes.
    pub fn clear(&mut self) {
        self.deferred = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOREGROUND: Foreground = Foreground {
        visible: true,
        focused: true,
    };
    const UNFOCUSED: Foreground = Foreground {
        visible: true,
        focused: false,
    };
    const HIDDEN: Foreground = Foreground {
        visible: false,
        focused: true,
    };

    fn target() -> ConnectionTarget {
        ConnectionTarget::new("ws-1", "thread-1").expect("valid")
    }

    #[test]
    fn detach_in_foreground_reconnects() {
        let mut gate = FocusGate::new();
        assert_eq!(gate.on_detach(&target(), FOREGROUND), DetachDecision::ReconnectNow);
        assert!(gate.deferred().is_none());
    }

    #[test]
    fn detach_unfocused_or_hidden_defers() {
        for env in [UNFOCUSED, HIDDEN] {
            let mut gate = FocusGate::new();
            assert_eq!(gate.on_detach(&target(), env), DetachDecision::Deferred);
            assert_eq!(
                gate.deferred(),
                Some((&target(), DeferReason::Detached))
            );
        }
    }

    #[test]
    fn regain_releases_deferred_detach_once() {
        let mut gate = FocusGate::new();
        gate.on_detach(&target(), UNFOCUSED);
        assert_eq!(
            gate.on_regain(FOREGROUND),
            Some((target(), DeferReason::Detached))
        );
        assert_eq!(gate.on_regain(FOREGROUND), None);
    }

    #[test]
    fn regain_while_still_hidden_keeps_waiting() {
        let mut gate = FocusGate::new();
        gate.on_detach(&target(), UNFOCUSED);
        assert_eq!(gate.on_regain(HIDDEN), None);
        assert!(gate.deferred().is_some());
    }

    #[test]
    fn abandoned_attempt_resumes_on_regain() {
        let mut gate = FocusGate::new();
        gate.on_abandoned(&target());
        assert_eq!(
            gate.on_regain(FOREGROUND),
            Some((target(), DeferReason::Abandoned))
        );
    }

    #[test]
    fn abandon_does_not_overwrite_detach() {
        let mut gate = FocusGate::new();
        gate.on_detach(&target(), UNFOCUSED);
        gate.on_abandoned(&target());
        assert_eq!(gate.deferred(), Some((&target(), DeferReason::Detached)));
    }

    #[test]
    fn clear_forgets_deferral() {
        let mut gate = FocusGate::new();
        gate.on_detach(&target(), UNFOCUSED);
        gate.clear();
        assert_eq!(gate.on_regain(FOREGROUND), None);
    }

    #[test]
    fn transitions_classify_regain() {
        assert!(FocusTransition::Focus.is_regain());
        assert!(FocusTransition::Visible.is_regain());
        assert!(!FocusTransition::Blur.is_regain());
        assert!(!FocusTransition::Hidden.is_regain());
    }
}
