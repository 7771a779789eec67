//! Per-target generation counters: detect stale async completions.

use std::collections::HashMap;

use crate::types::ConnectionTarget;

/// Tracks one monotonically increasing counter per target.
///
/// Targets are independent: bumping `ws:a` never affects `ws:b`.
#[derive(Debug, Clone, Default)]
pub struct GenerationTable {
    map: HashMap<ConnectionTarget, u64>,
}

impl GenerationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next generation for `target`. The first issued value is 1.
    pub fn bump(&mut self, target: &ConnectionTarget) -> u64 {
        let entry = self.map.entry(target.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Latest generation issued for `target`, if any.
    pub fn latest(&self, target: &ConnectionTarget) -> Option<u64> {
        self.map.get(target).copied()
    }

    pub fn is_latest(&self, target: &ConnectionTarget, generation: u64) -> bool {
        self.latest(target) == Some(generation)
    }
}
