//! threadlive-runtime: async shell around the threadlive-core decisions.
//!
//! [`spawn_live_connection`] mounts one connection manager on the current
//! tokio runtime. It listens to the server-event bus, keeps the live channel
//! of the selected thread subscribed, and publishes `polling`/`live` through
//! a watch channel.

pub mod backend;
pub mod config;
pub mod connection;
pub mod environment;
pub mod event_bus;
pub mod reconnector;
pub mod replay;
mod session;

pub use backend::{LiveBackend, RpcError, ThreadRefresher};
pub use config::{ConfigError, LiveArgs, LiveConfig};
pub use connection::{LiveConnectionHandle, LiveDeps, spawn_live_connection};
pub use environment::{Environment, SharedEnvironment};
pub use event_bus::EventBus;
pub use reconnector::{PendingReconnect, Reconnector};
