//! Desired-target supervision for live channel subscriptions.
//!
//! Every subscribe attempt is stamped with a generation for its target.
//! When the attempt resolves, [`LiveSupervisor::settle`] decides whether the
//! completion is authoritative, must be left alone, or left an orphaned
//! subscription behind that has to be released.
//!
//! The supervisor also keeps the set of targets it believes the backend holds
//! a subscription for, so that switching away from a target releases it
//! exactly once no matter in which order completions arrive.

use std::collections::{HashMap, HashSet};

use crate::generation::GenerationTable;
use crate::types::ConnectionTarget;

/// One in-flight subscribe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub target: ConnectionTarget,
    pub generation: u64,
}

/// Result of starting an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Begun {
    pub attempt: Attempt,
    /// Superseded subscriptions that nothing else will release.
    pub release: Vec<ConnectionTarget>,
}

/// What to do once an attempt's subscribe call resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Latest generation for a still-desired target: apply it.
    Authoritative,
    /// Stale, but a newer attempt or the desired target owns the subscription.
    Superseded,
    /// Stale and orphaned: unsubscribe the attempt's target.
    Release,
    /// The subscribe call failed and there is nothing to clean up.
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct LiveSupervisor {
    generations: GenerationTable,
    desired: Option<ConnectionTarget>,
    /// Attempts whose subscribe call has not resolved yet, per target.
    in_flight: HashMap<ConnectionTarget, usize>,
    /// Targets with a subscription we have not released.
    subscribed: HashSet<ConnectionTarget>,
}

impl LiveSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desired(&self) -> Option<&ConnectionTarget> {
        self.desired.as_ref()
    }

    pub fn is_desired(&self, target: &ConnectionTarget) -> bool {
        self.desired.as_ref() == Some(target)
    }

    pub fn in_flight(&self, target: &ConnectionTarget) -> usize {
        self.in_flight.get(target).copied().unwrap_or(0)
    }

    /// Whether a subscription for `target` is believed to be held.
    pub fn is_subscribed(&self, target: &ConnectionTarget) -> bool {
        self.subscribed.contains(target)
    }

    /// Held subscriptions, sorted.
    pub fn subscribed(&self) -> Vec<&ConnectionTarget> {
        let mut targets: Vec<&ConnectionTarget> = self.subscribed.iter().collect();
        targets.sort();
        targets
    }

    /// Start an attempt for `target`, making it the desired target.
    pub fn begin(&mut self, target: ConnectionTarget) -> Begun {
        let generation = self.generations.bump(&target);
        *self.in_flight.entry(target.clone()).or_insert(0) += 1;
        self.desired = Some(target.clone());

        let release = self.take_orphans(|other| *other != target);
        Begun {
            attempt: Attempt { target, generation },
            release,
        }
    }

    /// Decide the fate of a resolved attempt.
    ///
    /// `subscribed` is whether the subscribe call succeeded.
    pub fn settle(&mut self, attempt: &Attempt, subscribed: bool) -> Settlement {
        let target = &attempt.target;
        if let Some(count) = self.in_flight.get_mut(target) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.in_flight.remove(target);
            }
        }
        let owned_elsewhere = self.in_flight.contains_key(target) || self.is_desired(target);

        if !subscribed {
            // An earlier stale success may have been kept alive for this attempt.
            if !owned_elsewhere && self.subscribed.remove(target) {
                return Settlement::Release;
            }
            return Settlement::Failed;
        }

        if self.generations.is_latest(target, attempt.generation) && self.is_desired(target) {
            self.subscribed.insert(target.clone());
            return Settlement::Authoritative;
        }

        if owned_elsewhere {
            self.subscribed.insert(target.clone());
            Settlement::Superseded
        } else {
            self.subscribed.remove(target);
            Settlement::Release
        }
    }

    /// Stop wanting the desired target if an attempt for it is still in flight.
    ///
    /// The attempt resolves as [`Settlement::Release`]. Returns the abandoned
    /// target.
    pub fn abandon_pending(&mut self) -> Option<ConnectionTarget> {
        let pending = self
            .desired
            .as_ref()
            .is_some_and(|target| self.in_flight.contains_key(target));
        if pending { self.desired.take() } else { None }
    }

    /// Drop the desired target entirely (deselection or shutdown).
    ///
    /// Returns held subscriptions no in-flight attempt will release itself.
    pub fn clear(&mut self) -> Vec<ConnectionTarget> {
        self.desired = None;
        self.take_orphans(|_| true)
    }

    /// Forget a subscription that was torn down out of band.
    pub fn forget(&mut self, target: &ConnectionTarget) -> bool {
        self.subscribed.remove(target)
    }

    fn take_orphans(
        &mut self,
        eligible: impl Fn(&ConnectionTarget) -> bool,
    ) -> Vec<ConnectionTarget> {
        let mut released: Vec<ConnectionTarget> = self
            .subscribed
            .iter()
            .filter(|target| eligible(target) && !self.in_flight.contains_key(*target))
            .cloned()
            .collect();
        for target in &released {
            self.subscribed.remove(target);
        }
        released.sort();
        released
    }
}

// ─── Tests ────────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[derive(Debug, Clone)]
    enum Op {
        Begin(usize),
        Settle { pick: usize, ok: bool },
        Blur,
        Clear,
    }

    fn arb_op(threads: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0..threads).prop_map(Op::Begin),
            4 => (any::<usize>(), any::<bool>()).prop_map(|(pick, ok)| Op::Settle { pick, ok }),
            1 => Just(Op::Blur),
            1 => Just(Op::Clear),
        ]
    }

    fn target(idx: usize) -> ConnectionTarget {
        ConnectionTarget::new("ws-1", format!("thread-{idx}")).expect("valid")
    }

    fn unsubscribe(backend: &mut HashSet<ConnectionTarget>, target: &ConnectionTarget) {
        assert!(
            backend.remove(target),
            "unsubscribe issued for {target} which is not subscribed"
        );
    }

    fn settle(
        sup: &mut LiveSupervisor,
        backend: &mut HashSet<ConnectionTarget>,
        attempt: &Attempt,
        ok: bool,
    ) -> usize {
        if ok {
            backend.insert(attempt.target.clone());
        }
        if sup.settle(attempt, ok) == Settlement::Release {
            unsubscribe(backend, &attempt.target);
            1
        } else {
            0
        }
    }

    /// Backend model: a set of subscribed targets. Returns the unsubscribe count.
    fn run(ops: &[Op], drain_ok: bool) -> (LiveSupervisor, HashSet<ConnectionTarget>, usize) {
        let mut sup = LiveSupervisor::new();
        let mut backend: HashSet<ConnectionTarget> = HashSet::new();
        let mut pending: Vec<Attempt> = Vec::new();
        let mut unsubscribes = 0;

        for op in ops {
            match op {
                Op::Begin(idx) => {
                    let begun = sup.begin(target(*idx));
                    for released in &begun.release {
                        unsubscribe(&mut backend, released);
                        unsubscribes += 1;
                    }
                    pending.push(begun.attempt);
                }
                Op::Settle { pick, ok } => {
                    if !pending.is_empty() {
                        let attempt = pending.remove(pick % pending.len());
                        unsubscribes += settle(&mut sup, &mut backend, &attempt, *ok);
                    }
                }
                Op::Blur => {
                    sup.abandon_pending();
                }
                Op::Clear => {
                    for released in sup.clear() {
                        unsubscribe(&mut backend, &released);
                        unsubscribes += 1;
                    }
                }
            }
        }
        for attempt in &pending {
            unsubscribes += settle(&mut sup, &mut backend, attempt, drain_ok);
        }
        (sup, backend, unsubscribes)
    }

    proptest! {
        /// Once everything settled, only the desired target can still be subscribed.
        #[test]
        fn only_desired_target_survives(
            ops in prop::collection::vec(arb_op(4), 0..40),
            drain_ok in any::<bool>(),
        ) {
            let (sup, backend, _) = run(&ops, drain_ok);
            for target in &backend {
                prop_assert_eq!(Some(target), sup.desired());
            }
            let held: HashSet<ConnectionTarget> = sup.subscribed().into_iter().cloned().collect();
            prop_assert_eq!(held, backend);
        }

        /// Repeated reconnects to one target never unsubscribe it.
        #[test]
        fn same_target_never_unsubscribes(
            ops in prop::collection::vec(
                prop_oneof![
                    Just(Op::Begin(0)),
                    (any::<usize>(), any::<bool>())
                        .prop_map(|(pick, ok)| Op::Settle { pick, ok }),
                ],
                0..40,
            ),
            drain_ok in any::<bool>(),
        ) {
            let (_, _, unsubscribes) = run(&ops, drain_ok);
            prop_assert_eq!(unsubscribes, 0);
        }
    }
}
