use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Target ───────────────────────────────────────────────────────

/// The `(workspace, thread)` pair a live channel is wanted for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTarget {
    pub workspace_id: String,
    pub thread_id: String,
}

impl ConnectionTarget {
    /// Build a target, rejecting empty or whitespace-only ids.
    pub fn new(
        workspace_id: impl Into<String>,
        thread_id: impl Into<String>,
    ) -> Result<Self, CoreError> {
        let workspace_id = workspace_id.into();
        let thread_id = thread_id.into();
        if workspace_id.trim().is_empty() {
            return Err(CoreError::InvalidTarget("empty workspace id".to_string()));
        }
        if thread_id.trim().is_empty() {
            return Err(CoreError::InvalidTarget("empty thread id".to_string()));
        }
        Ok(Self {
            workspace_id,
            thread_id,
        })
    }

    /// Log and transcript label: `workspaceId:threadId`. Not unique when ids contain `:`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.workspace_id, self.thread_id)
    }

    /// Whether an event from `workspace_id` about `thread_id` is scoped to this target.
    pub fn matches(&self, workspace_id: &str, thread_id: Option<&str>) -> bool {
        self.workspace_id == workspace_id && thread_id == Some(self.thread_id.as_str())
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workspace_id, self.thread_id)
    }
}

// ─── Connection state ─────────────────────────────────────────────

/// Observable delivery mode of the active thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Updates are assumed stale and must be backfilled.
    #[default]
    Polling,
    /// Server push has been observed flowing for the active thread.
    Live,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Polling => "polling",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Backend mode ─────────────────────────────────────────────────

/// Where the agent backend runs. Only a remote backend needs a live channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    Local,
    #[default]
    Remote,
}

impl BackendMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }

    pub fn uses_live_channel(self) -> bool {
        self == Self::Remote
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            _ => Err(CoreError::InvalidConfig(format!("unknown backend mode: {s}"))),
        }
    }
}

// ─── Selection ────────────────────────────────────────────────────

/// What the user currently has open.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub workspace_id: Option<String>,
    /// Whether the workspace's backend connection is up.
    #[serde(default = "default_connected")]
    pub connected: bool,
    pub thread_id: Option<String>,
}

fn default_connected() -> bool {
    true
}

impl Selection {
    pub fn new(workspace_id: impl Into<String>, thread_id: Option<&str>) -> Self {
        Self {
            workspace_id: Some(workspace_id.into()),
            connected: true,
            thread_id: thread_id.map(str::to_string),
        }
    }

    #[must_use]
    pub fn disconnected(mut self) -> Self {
        self.connected = false;
        self
    }

    /// The target implied by this selection, if any.
    ///
    /// A disconnected workspace never yields a target.
    pub fn target(&self) -> Option<ConnectionTarget> {
        if !self.connected {
            return None;
        }
        let workspace_id = self.workspace_id.as_deref()?;
        let thread_id = self.thread_id.as_deref()?;
        ConnectionTarget::new(workspace_id, thread_id).ok()
    }
}

// ─── Reconnect options ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectOptions {
    /// Ask the backend to resume the thread after an authoritative subscribe.
    pub run_resume: bool,
}

impl ReconnectOptions {
    pub const PLAIN: Self = Self { run_resume: false };
    pub const RESUME: Self = Self { run_resume: true };
}

// ─── Errors ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("invalid connection target: {0}")]
    InvalidTarget(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
