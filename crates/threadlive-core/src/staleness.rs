//! Staleness deadline for the active live channel.
//!
//! Single-shot: once [`StalenessDeadline::poll_expired`] reports expiry the
//! deadline disarms itself until the next `arm` or `heartbeat`.

use crate::types::ConnectionTarget;

// ─── Constants ───────────────────────────────────────────────────────

/// Default inactivity threshold in milliseconds (20 seconds).
pub const DEFAULT_STALENESS_MS: u64 = 20_000;

/// An armed deadline for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmedDeadline {
    pub target: ConnectionTarget,
    pub deadline_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessDeadline {
    threshold_ms: u64,
    armed: Option<ArmedDeadline>,
}

impl StalenessDeadline {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms: threshold_ms.max(1),
            armed: None,
        }
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    pub fn armed(&self) -> Option<&ArmedDeadline> {
        self.armed.as_ref()
    }

    /// Deadline in milliseconds on the caller's clock, if armed.
    pub fn deadline_ms(&self) -> Option<u64> {
        self.armed.as_ref().map(|armed| armed.deadline_ms)
    }

    /// Arm (or re-arm) for `target` starting at `now_ms`.
    pub fn arm(&mut self, target: ConnectionTarget, now_ms: u64) {
        self.armed = Some(ArmedDeadline {
            target,
            deadline_ms: now_ms.saturating_add(self.threshold_ms),
        });
    }

    /// Push the deadline out on a heartbeat for `target`.
    ///
    /// A heartbeat proves the channel is alive, so an unarmed deadline is armed.
    pub fn heartbeat(&mut self, target: &ConnectionTarget, now_ms: u64) {
        self.arm(target.clone(), now_ms);
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    /// If the deadline passed, disarm and return the target it was armed for.
    pub fn poll_expired(&mut self, now_ms: u64) -> Option<ConnectionTarget> {
        let expired = self
            .armed
            .as_ref()
            .is_some_and(|armed| now_ms >= armed.deadline_ms);
        if expired {
            self.armed.take().map(|armed| armed.target)
        } else {
            None
        }
    }
}

impl Default for StalenessDeadline {
    fn default() -> Self {
        Self::new(DEFAULT_STALENESS_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ConnectionTarget {
        ConnectionTarget::new("ws-1", "thread-1").expect("valid")
    }

    #[test]
    fn unarmed_never_expires() {
        let mut deadline = StalenessDeadline::new(1_000);
        assert_eq!(deadline.poll_expired(u64::MAX), None);
    }

    #[test]
    fn expires_at_threshold() {
        let mut deadline = StalenessDeadline::new(1_000);
        deadline.arm(target(), 500);
        assert_eq!(deadline.deadline_ms(), Some(1_500));
        assert_eq!(deadline.poll_expired(1_499), None);
        assert_eq!(deadline.poll_expired(1_500), Some(target()));
    }

    #[test]
    fn expiry_is_single_shot() {
        let mut deadline = StalenessDeadline::new(1_000);
        deadline.arm(target(), 0);
        assert!(deadline.poll_expired(2_000).is_some());
        assert!(deadline.poll_expired(3_000).is_none());
        assert!(deadline.armed().is_none());
    }

    #[test]
    fn heartbeat_pushes_deadline_out() {
        let mut deadline = StalenessDeadline::new(1_000);
        deadline.arm(target(), 0);
        deadline.heartbeat(&target(), 900);
        assert_eq!(deadline.poll_expired(1_200), None);
        assert_eq!(deadline.deadline_ms(), Some(1_900));
    }

    #[test]
    fn disarm_cancels() {
        let mut deadline = StalenessDeadline::new(1_000);
        deadline.arm(target(), 0);
        deadline.disarm();
        assert_eq!(deadline.poll_expired(5_000), None);
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let deadline = StalenessDeadline::new(0);
        assert_eq!(deadline.threshold_ms(), 1);
        assert_eq!(StalenessDeadline::default().threshold_ms(), DEFAULT_STALENESS_MS);
    }
}
