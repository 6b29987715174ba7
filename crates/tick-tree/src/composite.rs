//! Composite nodes.
//!
//! Composite nodes own an ordered list of children and decide which of them
//! to tick. This module provides [`Sequence`] (AND logic), [`Selector`] (OR
//! logic), [`RandomSelector`], [`Parallel`] and [`Switch`].

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};

use crate::{BoxedNode, Composite, Node, Status};

/// Runs children in order, one child per tick.
///
/// # Semantics
///
/// Only the child at the current index is ticked:
/// - `Success` advances the index. If that was the last child, the sequence
///   returns `Success`; otherwise it returns `Running` and the next child is
///   ticked on the **next** call.
/// - `Failure` is returned immediately and the index stays put.
/// - `Running` is passed through.
///
/// An empty sequence succeeds.
pub struct Sequence {
    name: String,
    children: Vec<BoxedNode>,
    current: usize,
}

impl Sequence {
    /// Creates a new sequence with the given children.
    pub fn new(children: Vec<BoxedNode>) -> Self {
        Self {
            name: "Sequence".to_string(),
            children,
            current: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Node for Sequence {
    fn tick(&mut self) -> Status {
        let Some(child) = self.children.get_mut(self.current) else {
            return Status::Success;
        };
        match child.tick() {
            Status::Success => {
                self.current += 1;
                if self.current >= self.children.len() {
                    Status::Success
                } else {
                    Status::Running
                }
            }
            Status::Failure => Status::Failure,
            Status::Running => Status::Running,
        }
    }

    fn reset(&mut self) {
        self.children.iter_mut().for_each(|child| child.reset());
        self.current = 0;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Composite for Sequence {
    fn add_child(&mut self, child: BoxedNode) {
        self.children.push(child);
    }

    fn len(&self) -> usize {
        self.children.len()
    }
}

/// Tries children in order until one does not fail.
///
/// # Semantics
///
/// Unlike [`Sequence`], a selector may tick several children in one call:
/// - `Failure` advances to the next child **within the same tick**
/// - `Success` short-circuits; later children are not ticked
/// - `Running` stops the scan and is returned
///
/// Running out of children returns `Failure`.
pub struct Selector {
    name: String,
    children: Vec<BoxedNode>,
    current: usize,
}

impl Selector {
    /// Creates a new selector with the given children.
    pub fn new(children: Vec<BoxedNode>) -> Self {
        Self {
            name: "Selector".to_string(),
            children,
            current: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Node for Selector {
    fn tick(&mut self) -> Status {
        while let Some(child) = self.children.get_mut(self.current) {
            match child.tick() {
                Status::Success => return Status::Success,
                Status::Failure => self.current += 1,
                Status::Running => return Status::Running,
            }
        }
        Status::Failure
    }

    fn reset(&mut self) {
        self.children.iter_mut().for_each(|child| child.reset());
        self.current = 0;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Composite for Selector {
    fn add_child(&mut self, child: BoxedNode) {
        self.children.push(child);
    }

    fn len(&self) -> usize {
        self.children.len()
    }
}

/// A [`Selector`] that visits children in a random order.
///
/// A fresh uniformly random permutation is drawn on the first tick of each
/// pass. A pass ends on `Success`, on exhaustion, or on [`Node::reset`];
/// ticks within an unfinished pass reuse the same permutation, so every child
/// is visited at most once per pass.
pub struct RandomSelector {
    name: String,
    children: Vec<BoxedNode>,
    order: Vec<usize>,
    cursor: usize,
    rng: Box<dyn RngCore + Send>,
}

impl RandomSelector {
    /// Creates a random selector seeded from the operating system.
    pub fn new(children: Vec<BoxedNode>) -> Self {
        Self::with_rng(children, StdRng::from_os_rng())
    }

    /// Creates a random selector drawing permutations from `rng`.
    pub fn with_rng(children: Vec<BoxedNode>, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            name: "RandomSelector".to_string(),
            children,
            order: Vec::new(),
            cursor: 0,
            rng: Box::new(rng),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn finish_pass(&mut self) {
        self.order.clear();
        self.cursor = 0;
    }
}

impl Default for RandomSelector {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Node for RandomSelector {
    fn tick(&mut self) -> Status {
        if self.order.is_empty() {
            self.order.extend(0..self.children.len());
            self.order.shuffle(&mut *self.rng);
            self.cursor = 0;
        }

        while let Some(&index) = self.order.get(self.cursor) {
            match self.children[index].tick() {
                Status::Success => {
                    self.finish_pass();
                    return Status::Success;
                }
                Status::Failure => self.cursor += 1,
                Status::Running => return Status::Running,
            }
        }

        self.finish_pass();
        Status::Failure
    }

    fn reset(&mut self) {
        self.children.iter_mut().for_each(|child| child.reset());
        self.finish_pass();
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Composite for RandomSelector {
    fn add_child(&mut self, child: BoxedNode) {
        self.children.push(child);
    }

    fn len(&self) -> usize {
        self.children.len()
    }
}

/// How many children must agree before a [`Parallel`] node decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Policy {
    /// Every child must report the outcome.
    RequireAll,
    /// At least one child must report the outcome.
    RequireOne,
}

impl Policy {
    #[inline]
    fn is_met(self, count: usize, total: usize) -> bool {
        match self {
            Policy::RequireAll => count == total,
            Policy::RequireOne => count > 0,
        }
    }
}

/// Ticks every child on every tick and aggregates the results.
///
/// # Semantics
///
/// The success policy is checked against the number of successful children,
/// the failure policy against the number of failed ones. Success is checked
/// first, so when both policies are met the node succeeds. If neither is met
/// the node is `Running`.
///
/// An empty parallel node succeeds.
pub struct Parallel {
    name: String,
    children: Vec<BoxedNode>,
    success_policy: Policy,
    failure_policy: Policy,
}

impl Parallel {
    pub fn new(success_policy: Policy, failure_policy: Policy) -> Self {
        Self {
            name: "Parallel".to_string(),
            children: Vec::new(),
            success_policy,
            failure_policy,
        }
    }

    pub fn with_children(mut self, children: Vec<BoxedNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for Parallel {
    /// Succeeds when all children succeed, fails as soon as one fails.
    fn default() -> Self {
        Self::new(Policy::RequireAll, Policy::RequireOne)
    }
}

impl Node for Parallel {
    fn tick(&mut self) -> Status {
        let total = self.children.len();
        if total == 0 {
            return Status::Success;
        }

        let mut successes = 0;
        let mut failures = 0;
        for child in &mut self.children {
            match child.tick() {
                Status::Success => successes += 1,
                Status::Failure => failures += 1,
                Status::Running => {}
            }
        }

        if self.success_policy.is_met(successes, total) {
            Status::Success
        } else if self.failure_policy.is_met(failures, total) {
            Status::Failure
        } else {
            Status::Running
        }
    }

    fn reset(&mut self) {
        self.children.iter_mut().for_each(|child| child.reset());
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Composite for Parallel {
    fn add_child(&mut self, child: BoxedNode) {
        self.children.push(child);
    }

    fn len(&self) -> usize {
        self.children.len()
    }
}

/// Chooses which child branch to run on every tick.
///
/// # Semantics
///
/// The chooser is asked for a branch index on each tick. When the choice
/// differs from the branch that ran last, the previous branch is reset before
/// the new one is ticked, so a branch always starts fresh after losing and
/// regaining control. `None` or an out-of-range index returns `Failure`.
pub struct Switch {
    name: String,
    children: Vec<BoxedNode>,
    chooser: Box<dyn FnMut() -> Option<usize> + Send>,
    active: Option<usize>,
}

impl Switch {
    pub fn new(chooser: impl FnMut() -> Option<usize> + Send + 'static) -> Self {
        Self {
            name: "Switch".to_string(),
            children: Vec::new(),
            chooser: Box::new(chooser),
            active: None,
        }
    }

    pub fn with_children(mut self, children: Vec<BoxedNode>) -> Self {
        self.children = children;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Node for Switch {
    fn tick(&mut self) -> Status {
        let Some(index) = (self.chooser)().filter(|&index| index < self.children.len()) else {
            return Status::Failure;
        };

        if self.active != Some(index) {
            if let Some(previous) = self.active {
                tracing::debug!(
                    switch = %self.name,
                    from = previous,
                    to = index,
                    "switching branch"
                );
                self.children[previous].reset();
            }
            self.active = Some(index);
        }

        self.children[index].tick()
    }

    fn reset(&mut self) {
        self.children.iter_mut().for_each(|child| child.reset());
        self.active = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Composite for Switch {
    fn add_child(&mut self, child: BoxedNode) {
        self.children.push(child);
    }

    fn len(&self) -> usize {
        self.children.len()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::test_nodes::Scripted;
    use Status::{Failure, Running, Success};

    #[test]
    fn sequence_ticks_one_child_per_call() {
        let (a, a_stats) = Scripted::boxed("a", &[Success]);
        let (b, b_stats) = Scripted::boxed("b", &[Success]);
        let mut seq = Sequence::new(vec![a, b]);

        assert_eq!(seq.tick(), Running);
        assert_eq!(a_stats.ticks(), 1);
        assert_eq!(b_stats.ticks(), 0);

        assert_eq!(seq.tick(), Success);
        assert_eq!(b_stats.ticks(), 1);
    }

    #[test]
    fn sequence_retries_failed_child_without_reset() {
        let (a, a_stats) = Scripted::boxed("a", &[Success]);
        let (b, b_stats) = Scripted::boxed("b", &[Failure]);
        let (c, c_stats) = Scripted::boxed("c", &[Success]);
        let mut seq = Sequence::new(vec![a, b, c]);

        assert_eq!(seq.tick(), Running);
        assert_eq!(seq.tick(), Failure);
        assert_eq!(seq.tick(), Failure);

        assert_eq!(a_stats.ticks(), 1);
        assert_eq!(b_stats.ticks(), 2);
        assert_eq!(c_stats.ticks(), 0);
    }

    #[test]
    fn sequence_reset_restarts_from_first_child() {
        let (a, a_stats) = Scripted::boxed("a", &[Success]);
        let (b, b_stats) = Scripted::boxed("b", &[Running]);
        let mut seq = Sequence::new(vec![a, b]);

        assert_eq!(seq.tick(), Running);
        assert_eq!(seq.tick(), Running);
        seq.reset();
        seq.reset();

        assert_eq!(a_stats.resets(), 2);
        assert_eq!(b_stats.resets(), 2);
        assert_eq!(seq.tick(), Running);
        assert_eq!(a_stats.ticks(), 2);
    }

    #[test]
    fn empty_sequence_succeeds() {
        assert_eq!(Sequence::default().tick(), Success);
    }

    #[test]
    fn selector_ticks_past_failures_in_one_call() {
        let (a, a_stats) = Scripted::boxed("a", &[Failure]);
        let (b, b_stats) = Scripted::boxed("b", &[Success]);
        let (c, c_stats) = Scripted::boxed("c", &[Success]);
        let mut sel = Selector::new(vec![a, b, c]);

        assert_eq!(sel.tick(), Success);
        assert_eq!(a_stats.ticks(), 1);
        assert_eq!(b_stats.ticks(), 1);
        assert_eq!(c_stats.ticks(), 0);
    }

    #[test]
    fn selector_stops_on_running() {
        let (a, _) = Scripted::boxed("a", &[Failure]);
        let (b, b_stats) = Scripted::boxed("b", &[Running, Success]);
        let (c, c_stats) = Scripted::boxed("c", &[Success]);
        let mut sel = Selector::new(vec![a, b, c]);

        assert_eq!(sel.tick(), Running);
        assert_eq!(sel.tick(), Success);
        assert_eq!(b_stats.ticks(), 2);
        assert_eq!(c_stats.ticks(), 0);
    }

    #[test]
    fn selector_fails_when_all_fail() {
        let (a, _) = Scripted::boxed("a", &[Failure]);
        let (b, _) = Scripted::boxed("b", &[Failure]);
        let mut sel = Selector::new(vec![a, b]);

        assert_eq!(sel.tick(), Failure);
        assert_eq!(Selector::default().tick(), Failure);
    }

    #[test]
    fn random_selector_visits_each_child_once_per_pass() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let children: Vec<BoxedNode> = (0..6)
            .map(|i| {
                let (scripted, _) = Scripted::logged(&i.to_string(), &[Failure], &log);
                Box::new(scripted) as BoxedNode
            })
            .collect();
        let mut sel = RandomSelector::with_rng(children, StdRng::seed_from_u64(7));

        assert_eq!(sel.tick(), Failure);

        let visited = log.lock().unwrap().clone();
        assert_eq!(visited.len(), 6);
        let unique: HashSet<_> = visited.iter().collect();
        assert_eq!(unique.len(), 6);
    }

    #[test]
    fn random_selector_keeps_order_within_a_pass() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let children: Vec<BoxedNode> = (0..4)
            .map(|i| {
                let (scripted, _) = Scripted::logged(&i.to_string(), &[Running, Failure], &log);
                Box::new(scripted) as BoxedNode
            })
            .collect();
        let mut sel = RandomSelector::with_rng(children, StdRng::seed_from_u64(11));

        // Each child runs once, then fails on its second tick.
        let mut statuses = Vec::new();
        for _ in 0..5 {
            statuses.push(sel.tick());
        }
        assert_eq!(statuses, vec![Running, Running, Running, Running, Failure]);

        let visited = log.lock().unwrap().clone();
        assert_eq!(visited.len(), 8);
        let unique: HashSet<_> = visited.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn random_selector_short_circuits_on_success() {
        let (a, a_stats) = Scripted::boxed("a", &[Success]);
        let (b, b_stats) = Scripted::boxed("b", &[Success]);
        let mut sel = RandomSelector::with_rng(vec![a, b], StdRng::seed_from_u64(3));

        assert_eq!(sel.tick(), Success);
        assert_eq!(a_stats.ticks() + b_stats.ticks(), 1);
    }

    /// Children named by index, all following `script`, logging every tick.
    fn indexed_children(
        count: usize,
        script: &[Status],
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Vec<BoxedNode> {
        (0..count)
            .map(|i| {
                let (scripted, _) = Scripted::logged(&i.to_string(), script, log);
                Box::new(scripted) as BoxedNode
            })
            .collect()
    }

    /// Replays the permutations a selector seeded with `seed` should draw.
    fn expected_orders(seed: u64, len: usize, passes: usize) -> Vec<Vec<usize>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..passes)
            .map(|_| {
                let mut order: Vec<usize> = (0..len).collect();
                order.shuffle(&mut rng);
                order
            })
            .collect()
    }

    fn labels(order: &[usize]) -> Vec<String> {
        order.iter().map(usize::to_string).collect()
    }

    #[test]
    fn random_selector_redraws_after_exhaustion() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sel = RandomSelector::with_rng(
            indexed_children(8, &[Failure], &log),
            StdRng::seed_from_u64(21),
        );
        let expected = expected_orders(21, 8, 2);

        assert_eq!(sel.tick(), Failure);
        assert_eq!(*log.lock().unwrap(), labels(&expected[0]));
        assert!(sel.order.is_empty());

        log.lock().unwrap().clear();
        assert_eq!(sel.tick(), Failure);
        assert_eq!(*log.lock().unwrap(), labels(&expected[1]));
    }

    #[test]
    fn random_selector_redraws_after_success() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sel = RandomSelector::with_rng(
            indexed_children(5, &[Success], &log),
            StdRng::seed_from_u64(8),
        );
        let expected = expected_orders(8, 5, 3);

        for _ in 0..3 {
            assert_eq!(sel.tick(), Success);
        }
        let firsts: Vec<String> = expected.iter().map(|order| order[0].to_string()).collect();
        assert_eq!(*log.lock().unwrap(), firsts);
    }

    #[test]
    fn random_selector_keeps_permutation_until_reset() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sel = RandomSelector::with_rng(
            indexed_children(6, &[Running, Failure], &log),
            StdRng::seed_from_u64(33),
        );
        let expected = expected_orders(33, 6, 2);

        assert_eq!(sel.tick(), Running);
        assert_eq!(sel.tick(), Running);
        assert_eq!(sel.order, expected[0]);
        let first = expected[0][0].to_string();
        let second = expected[0][1].to_string();
        assert_eq!(*log.lock().unwrap(), vec![first.clone(), first, second]);

        sel.reset();
        assert!(sel.order.is_empty());

        log.lock().unwrap().clear();
        assert_eq!(sel.tick(), Running);
        assert_eq!(sel.order, expected[1]);
        assert_eq!(*log.lock().unwrap(), vec![expected[1][0].to_string()]);
    }

    #[test]
    fn parallel_success_wins_tie() {
        let (a, _) = Scripted::boxed("a", &[Success]);
        let (b, _) = Scripted::boxed("b", &[Failure]);
        let mut par =
            Parallel::new(Policy::RequireOne, Policy::RequireOne).with_children(vec![a, b]);

        assert_eq!(par.tick(), Success);
    }

    #[test]
    fn parallel_ticks_every_child() {
        let (a, a_stats) = Scripted::boxed("a", &[Failure]);
        let (b, b_stats) = Scripted::boxed("b", &[Running]);
        let (c, c_stats) = Scripted::boxed("c", &[Success]);
        let mut par = Parallel::default().with_children(vec![a, b, c]);

        assert_eq!(par.tick(), Failure);
        assert_eq!(a_stats.ticks(), 1);
        assert_eq!(b_stats.ticks(), 1);
        assert_eq!(c_stats.ticks(), 1);
    }

    #[test]
    fn parallel_runs_until_policy_met() {
        let (a, _) = Scripted::boxed("a", &[Success]);
        let (b, _) = Scripted::boxed("b", &[Running, Success]);
        let mut par = Parallel::default().with_children(vec![a, b]);

        assert_eq!(par.tick(), Running);
        assert_eq!(par.tick(), Success);
    }

    #[test]
    fn parallel_require_all_failures() {
        let (a, _) = Scripted::boxed("a", &[Failure]);
        let (b, _) = Scripted::boxed("b", &[Running, Failure]);
        let mut par =
            Parallel::new(Policy::RequireAll, Policy::RequireAll).with_children(vec![a, b]);

        assert_eq!(par.tick(), Running);
        assert_eq!(par.tick(), Failure);
    }

    #[test]
    fn empty_parallel_succeeds() {
        assert_eq!(Parallel::default().tick(), Success);
    }

    #[test]
    fn switch_resets_branch_that_loses_control() {
        let choice = Arc::new(AtomicUsize::new(0));
        let (a, a_stats) = Scripted::boxed("a", &[Running]);
        let (b, b_stats) = Scripted::boxed("b", &[Success]);

        let chosen = Arc::clone(&choice);
        let mut switch = Switch::new(move || Some(chosen.load(Ordering::SeqCst)))
            .with_children(vec![a, b]);

        assert_eq!(switch.tick(), Running);
        assert_eq!(switch.tick(), Running);
        assert_eq!(a_stats.resets(), 0);

        choice.store(1, Ordering::SeqCst);
        assert_eq!(switch.tick(), Success);
        assert_eq!(a_stats.resets(), 1);
        assert_eq!(b_stats.ticks(), 1);
    }

    #[test]
    fn switch_fails_without_valid_choice() {
        let (a, a_stats) = Scripted::boxed("a", &[Success]);
        let mut none = Switch::new(|| None).with_children(vec![a]);
        assert_eq!(none.tick(), Failure);
        assert_eq!(a_stats.ticks(), 0);

        let (b, _) = Scripted::boxed("b", &[Success]);
        let mut out_of_range = Switch::new(|| Some(4)).with_children(vec![b]);
        assert_eq!(out_of_range.tick(), Failure);
    }
}
