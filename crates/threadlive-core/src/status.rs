//! Serializable diagnostics snapshot of the connection manager.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::focus::DeferReason;
use crate::types::{BackendMode, ConnectionState, ConnectionTarget};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    pub mode: BackendMode,
    pub state: ConnectionState,
    /// Target implied by the current selection.
    pub active: Option<ConnectionTarget>,
    /// Target the live channel is currently wanted for.
    pub desired: Option<ConnectionTarget>,
    pub subscribed: Vec<ConnectionTarget>,
    pub deferred: Option<DeferReason>,
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub checked_at: DateTime<Utc>,
}

impl LiveStatus {
    /// Status of a manager that has nothing selected.
    pub fn idle(mode: BackendMode, now: DateTime<Utc>) -> Self {
        Self {
            mode,
            state: ConnectionState::Polling,
            active: None,
            desired: None,
            subscribed: Vec::new(),
            deferred: None,
            last_heartbeat_at: None,
            checked_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_status_serializes_camel_case() {
        let now = DateTime::parse_from_rfc3339("2026-02-19T00:00:00Z")
            .expect("valid")
            .with_timezone(&Utc);
        let json = serde_json::to_value(LiveStatus::idle(BackendMode::Remote, now))
            .expect("serialize");
        assert_eq!(json["mode"], "remote");
        assert_eq!(json["state"], "polling");
        assert!(json["lastHeartbeatAt"].is_null());
        assert_eq!(json["checkedAt"], "2026-02-19T00:00:00Z");
    }
}
