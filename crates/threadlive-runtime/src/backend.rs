//! RPC boundary consumed by the connection manager.
//!
//! The transport itself lives outside this crate; implementations of
//! [`LiveBackend`] wrap whatever client talks to the agent backend.

use async_trait::async_trait;
use thiserror::Error;

use threadlive_core::ConnectionTarget;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RpcError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend rejected {method}: {reason}")]
    Rejected { method: String, reason: String },

    #[error("{0} timed out")]
    Timeout(String),
}

/// Live channel subscription calls.
#[async_trait]
pub trait LiveBackend: Send + Sync {
    /// Establish push delivery for `target`.
    async fn subscribe(&self, target: &ConnectionTarget) -> Result<(), RpcError>;

    /// Tear push delivery down. Callers treat failures as best-effort.
    async fn unsubscribe(&self, target: &ConnectionTarget) -> Result<(), RpcError>;

    /// Ask the backend to resume the thread after a reconnect.
    async fn resume(&self, _target: &ConnectionTarget) -> Result<(), RpcError> {
        Ok(())
    }
}

/// Caller-supplied backfill of a thread's contents.
#[async_trait]
pub trait ThreadRefresher: Send + Sync {
    async fn refresh(&self, target: &ConnectionTarget) -> Result<(), RpcError>;
}
