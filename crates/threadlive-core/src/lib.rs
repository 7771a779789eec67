//! threadlive-core: decisions of the live/polling connection manager.
//!
//! Pure and synchronous. Every type here takes plain inputs (events, clock
//! readings in milliseconds, completion results) and returns what the
//! runtime should do next; no IO happens in this crate.

pub mod classify;
pub mod focus;
pub mod generation;
pub mod staleness;
pub mod status;
pub mod supervisor;
pub mod tracker;
pub mod types;

pub use classify::{ClassifiedEvent, EventKind, classify};
pub use focus::{DeferReason, DetachDecision, FocusGate, FocusTransition, Foreground};
pub use generation::GenerationTable;
pub use staleness::StalenessDeadline;
pub use status::LiveStatus;
pub use supervisor::{Attempt, Begun, LiveSupervisor, Settlement};
pub use tracker::{ConnectionTracker, TrackerSignal};
pub use types::{
    BackendMode, ConnectionState, ConnectionTarget, CoreError, ReconnectOptions, Selection,
};
