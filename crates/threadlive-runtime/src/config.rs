//! Connection manager configuration.
//!
//! Precedence, lowest first: defaults, `THREADLIVE_*` environment variables,
//! command-line flags. clap reads the variables through `env`.

use std::time::Duration;

use thiserror::Error;

use threadlive_core::staleness::DEFAULT_STALENESS_MS;
use threadlive_core::{BackendMode, CoreError};

pub const ENV_BACKEND_MODE: &str = "THREADLIVE_BACKEND_MODE";
pub const ENV_STALENESS_MS: &str = "THREADLIVE_STALENESS_MS";
pub const ENV_UNSUBSCRIBE_TIMEOUT_MS: &str = "THREADLIVE_UNSUBSCRIBE_TIMEOUT_MS";
pub const ENV_TEARDOWN_TIMEOUT_MS: &str = "THREADLIVE_TEARDOWN_TIMEOUT_MS";

/// Default bound on a best-effort unsubscribe call (milliseconds).
pub const DEFAULT_UNSUBSCRIBE_TIMEOUT_MS: u64 = 5_000;

/// Default bound on the stale-channel teardown that precedes a resubscribe.
pub const DEFAULT_TEARDOWN_TIMEOUT_MS: u64 = 1_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}={value:?}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConfig {
    pub backend_mode: BackendMode,
    /// Inactivity after which the live channel is presumed dead.
    pub staleness_threshold: Duration,
    /// Bound on background unsubscribes (supersession, deselect, unmount).
    pub unsubscribe_timeout: Duration,
    /// Bound on the unsubscribe a staleness resubscribe waits for.
    pub teardown_timeout: Duration,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            backend_mode: BackendMode::Remote,
            staleness_threshold: Duration::from_millis(DEFAULT_STALENESS_MS),
            unsubscribe_timeout: Duration::from_millis(DEFAULT_UNSUBSCRIBE_TIMEOUT_MS),
            teardown_timeout: Duration::from_millis(DEFAULT_TEARDOWN_TIMEOUT_MS),
        }
    }
}

impl LiveConfig {
    pub fn with_backend_mode(mut self, mode: BackendMode) -> Self {
        self.backend_mode = mode;
        self
    }

    pub fn staleness_ms(&self) -> u64 {
        self.staleness_threshold.as_millis() as u64
    }
}

fn positive_ms(key: &'static str, ms: u64) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::InvalidValue {
            key,
            value: ms.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}

/// Command-line flags for [`LiveConfig`].
#[derive(clap::Args, Debug, Clone)]
pub struct LiveArgs {
    /// Backend mode: `remote` manages a live channel, `local` never subscribes
    #[arg(long, env = ENV_BACKEND_MODE, default_value = "remote")]
    pub backend_mode: String,

    /// Milliseconds without a heartbeat before the live channel is presumed dead
    #[arg(long, env = ENV_STALENESS_MS, default_value_t = DEFAULT_STALENESS_MS)]
    pub staleness_ms: u64,

    /// Upper bound for best-effort unsubscribe calls, in milliseconds
    #[arg(long, env = ENV_UNSUBSCRIBE_TIMEOUT_MS, default_value_t = DEFAULT_UNSUBSCRIBE_TIMEOUT_MS)]
    pub unsubscribe_timeout_ms: u64,

    /// Upper bound for the stale-channel teardown before resubscribing, in milliseconds
    #[arg(long, env = ENV_TEARDOWN_TIMEOUT_MS, default_value_t = DEFAULT_TEARDOWN_TIMEOUT_MS)]
    pub teardown_timeout_ms: u64,
}

impl LiveArgs {
    pub fn to_config(&self) -> Result<LiveConfig, ConfigError> {
        Ok(LiveConfig {
            backend_mode: self.backend_mode.parse()?,
            staleness_threshold: positive_ms(ENV_STALENESS_MS, self.staleness_ms)?,
            unsubscribe_timeout: positive_ms(
                ENV_UNSUBSCRIBE_TIMEOUT_MS,
                self.unsubscribe_timeout_ms,
            )?,
            teardown_timeout: positive_ms(ENV_TEARDOWN_TIMEOUT_MS, self.teardown_timeout_ms)?,
        })
    }
}
