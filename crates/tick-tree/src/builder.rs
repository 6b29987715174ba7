//! Staged tree assembly.
//!
//! The [`Builder`] turns nested block calls into an owned tree. Composite
//! blocks (`sequence`, `selector`, ...) collect every node declared inside
//! them. Decorator blocks (`invert`, `repeat`, ...) wrap the **next** node
//! attached, wherever it is attached; several pending decorators wrap it
//! innermost-first.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tick_tree::{BehaviorTree, Status};
//!
//! let mut tree = BehaviorTree::build(|b| {
//!     b.selector(|b| {
//!         b.invert(|b| {
//!             b.condition("door locked", || false);
//!         });
//!         b.retry(Some(3), |b| {
//!             b.action("pick lock", || Status::Success);
//!         });
//!     });
//! })
//! .unwrap();
//!
//! assert_eq!(tree.run(), Status::Success);
//! ```

use std::any::Any;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::{
    Action, BehaviorTree, BoxedNode, Budget, BuildError, Composite, Condition, Cooldown,
    Decorator, EventBus, Inverter, MonotonicClock, Node, Parallel, Policy, RandomSelector,
    Repeater, Result, RetryUntilSuccess, Selector, Sequence, SharedClock, Sleep, SleepUntil,
    SleepUntilEvent, SleepUntilIdle, Status, SubTree, SuccessRate, Switch, Timeout,
};

struct OpenComposite {
    node: Box<dyn Composite>,
    /// Decorators that were pending when the block opened; they wrap the
    /// composite once it closes.
    decorators: Vec<Box<dyn Decorator>>,
}

/// Assembles a [`BehaviorTree`].
///
/// Structural errors are recorded as they happen and reported by
/// [`Builder::build`]; the first one wins.
pub struct Builder {
    clock: SharedClock,
    event_bus: Option<EventBus>,
    seed_rng: Option<StdRng>,
    decorators: Vec<Box<dyn Decorator>>,
    composites: Vec<OpenComposite>,
    root: Option<BoxedNode>,
    error: Option<BuildError>,
}

impl Builder {
    /// Creates a builder using the monotonic system clock and no event bus.
    pub fn new() -> Self {
        Self {
            clock: MonotonicClock::shared(),
            event_bus: None,
            seed_rng: None,
            decorators: Vec::new(),
            composites: Vec::new(),
            root: None,
            error: None,
        }
    }

    /// Clock handed to every timing node built from here on.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Bus used by [`Builder::sleep_until_event`].
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Derive every random node's RNG from `seed` instead of the OS.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed_rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn clock(&self) -> SharedClock {
        self.clock.clone()
    }

    pub fn event_bus(&self) -> Option<&EventBus> {
        self.event_bus.as_ref()
    }

    /// Applies `block` and builds the tree.
    pub fn build_with(mut self, block: impl FnOnce(&mut Self)) -> Result<BehaviorTree> {
        block(&mut self);
        self.build()
    }

    /// Finishes assembly.
    ///
    /// # Errors
    ///
    /// Returns the first recorded structural error, or an error if a
    /// composite block is still open, a decorator never received a child, or
    /// no root was attached.
    pub fn build(self) -> Result<BehaviorTree> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if !self.composites.is_empty() {
            return Err(BuildError::UnclosedComposite {
                open: self.composites.len(),
            });
        }
        if !self.decorators.is_empty() {
            return Err(BuildError::DanglingDecorators {
                count: self.decorators.len(),
            });
        }
        let root = self.root.ok_or(BuildError::MissingRoot)?;
        tracing::debug!(root = root.name(), "behavior tree built");
        Ok(BehaviorTree::from_root(root))
    }

    // ========================================================================
    // Primitives
    // ========================================================================

    /// Attaches `node`, first wrapping it in every pending decorator.
    pub fn node(&mut self, node: impl Node + 'static) -> &mut Self {
        self.attach(Box::new(node));
        self
    }

    /// Opens a composite block; nodes attached until [`Builder::close`]
    /// become its children.
    pub fn open(&mut self, composite: impl Composite + 'static) -> &mut Self {
        let decorators = std::mem::take(&mut self.decorators);
        self.composites.push(OpenComposite {
            node: Box::new(composite),
            decorators,
        });
        self
    }

    /// Closes the innermost open composite block and attaches it.
    pub fn close(&mut self) -> &mut Self {
        match self.composites.pop() {
            Some(OpenComposite {
                node,
                mut decorators,
            }) => {
                let node = wrap(node, &mut decorators);
                self.place(node);
            }
            None => self.record(BuildError::UnbalancedClose),
        }
        self
    }

    /// Declares a decorator that will wrap the next attached node.
    pub fn decorate(&mut self, decorator: impl Decorator + 'static) -> &mut Self {
        self.decorators.push(Box::new(decorator));
        self
    }

    fn attach(&mut self, node: BoxedNode) {
        let node = wrap(node, &mut self.decorators);
        self.place(node);
    }

    fn place(&mut self, node: BoxedNode) {
        if let Some(open) = self.composites.last_mut() {
            open.node.add_child(node);
        } else if let Some(existing) = &self.root {
            let error = BuildError::RootAlreadySet {
                existing: existing.name().to_string(),
                rejected: node.name().to_string(),
            };
            self.record(error);
        } else {
            self.root = Some(node);
        }
    }

    fn record(&mut self, error: BuildError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn composite(
        &mut self,
        composite: impl Composite + 'static,
        block: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.open(composite);
        block(self);
        self.close()
    }

    fn decorator(
        &mut self,
        decorator: impl Decorator + 'static,
        block: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.decorate(decorator);
        block(self);
        self
    }

    fn rng(&mut self) -> StdRng {
        match &mut self.seed_rng {
            Some(seed_rng) => StdRng::from_rng(seed_rng),
            None => StdRng::from_os_rng(),
        }
    }

    // ========================================================================
    // Composites
    // ========================================================================

    pub fn sequence(&mut self, block: impl FnOnce(&mut Self)) -> &mut Self {
        self.composite(Sequence::default(), block)
    }

    pub fn selector(&mut self, block: impl FnOnce(&mut Self)) -> &mut Self {
        self.composite(Selector::default(), block)
    }

    pub fn random_selector(&mut self, block: impl FnOnce(&mut Self)) -> &mut Self {
        let rng = self.rng();
        self.composite(RandomSelector::with_rng(Vec::new(), rng), block)
    }

    pub fn parallel(
        &mut self,
        success_policy: Policy,
        failure_policy: Policy,
        block: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.composite(Parallel::new(success_policy, failure_policy), block)
    }

    /// Branches declared in `block` are selected by index via `chooser`.
    pub fn switch(
        &mut self,
        name: impl Into<String>,
        chooser: impl FnMut() -> Option<usize> + Send + 'static,
        block: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.composite(Switch::new(chooser).with_name(name), block)
    }

    // ========================================================================
    // Decorators
    // ========================================================================

    pub fn invert(&mut self, block: impl FnOnce(&mut Self)) -> &mut Self {
        self.decorator(Inverter::new(), block)
    }

    /// `None` repeats forever.
    pub fn repeat(&mut self, max_repeats: Option<u32>, block: impl FnOnce(&mut Self)) -> &mut Self {
        self.decorator(Repeater::new(max_repeats), block)
    }

    /// `None` retries forever.
    pub fn retry(&mut self, max_attempts: Option<u32>, block: impl FnOnce(&mut Self)) -> &mut Self {
        self.decorator(RetryUntilSuccess::new(max_attempts), block)
    }

    pub fn cooldown(&mut self, cooldown: Duration, block: impl FnOnce(&mut Self)) -> &mut Self {
        let clock = self.clock();
        self.decorator(Cooldown::new(cooldown, clock), block)
    }

    /// Like [`Builder::cooldown`], reading the delay from `cooldown`.
    pub fn cooldown_with(
        &mut self,
        cooldown: impl FnMut() -> Duration + Send + 'static,
        block: impl FnOnce(&mut Self),
    ) -> &mut Self {
        let clock = self.clock();
        self.decorator(Cooldown::from_fn(cooldown, clock), block)
    }

    pub fn success_rate(&mut self, chance: f32, block: impl FnOnce(&mut Self)) -> &mut Self {
        let rng = self.rng();
        self.decorator(SuccessRate::with_rng(chance, rng), block)
    }

    /// Like [`Builder::success_rate`], asking `chance` for the probability on every tick.
    pub fn success_rate_with(
        &mut self,
        chance: impl FnMut() -> f32 + Send + 'static,
        block: impl FnOnce(&mut Self),
    ) -> &mut Self {
        let rng = self.rng();
        self.decorator(SuccessRate::from_fn(chance, rng), block)
    }

    /// Retries the next node until it succeeds, failing once `limit` has passed.
    pub fn timeout(&mut self, limit: Duration, block: impl FnOnce(&mut Self)) -> &mut Self {
        let clock = self.clock();
        self.decorator(Timeout::new(limit, clock), block)
    }

    // ========================================================================
    // Leaves
    // ========================================================================

    pub fn action(
        &mut self,
        name: impl Into<String>,
        action: impl FnMut() -> Status + Send + 'static,
    ) -> &mut Self {
        self.node(Action::new(name, action))
    }

    pub fn succeed(&mut self, name: impl Into<String>) -> &mut Self {
        self.action(name, || Status::Success)
    }

    /// Runs `after`, then succeeds.
    pub fn succeed_then(
        &mut self,
        name: impl Into<String>,
        mut after: impl FnMut() + Send + 'static,
    ) -> &mut Self {
        self.action(name, move || {
            after();
            Status::Success
        })
    }

    pub fn fail(&mut self, name: impl Into<String>) -> &mut Self {
        self.action(name, || Status::Failure)
    }

    /// Runs `after`, then fails.
    pub fn fail_then(
        &mut self,
        name: impl Into<String>,
        mut after: impl FnMut() + Send + 'static,
    ) -> &mut Self {
        self.action(name, move || {
            after();
            Status::Failure
        })
    }

    pub fn condition(
        &mut self,
        name: impl Into<String>,
        predicate: impl FnMut() -> bool + Send + 'static,
    ) -> &mut Self {
        self.node(Condition::new(name, predicate))
    }

    pub fn sleep(&mut self, duration: Duration) -> &mut Self {
        let clock = self.clock();
        self.node(Sleep::new(duration, clock))
    }

    pub fn sleep_until(
        &mut self,
        budget: impl Into<Budget>,
        predicate: impl FnMut() -> bool + Send + 'static,
    ) -> &mut Self {
        let clock = self.clock();
        self.node(SleepUntil::new(budget, clock, predicate))
    }

    pub fn sleep_until_idle(
        &mut self,
        idle: Duration,
        timeout: Duration,
        is_active: impl FnMut() -> bool + Send + 'static,
    ) -> &mut Self {
        let clock = self.clock();
        self.node(SleepUntilIdle::new(idle, timeout, clock, is_active))
    }

    /// Like [`Builder::sleep_until_idle`], succeeding early whenever `bypass` holds.
    pub fn sleep_until_idle_or(
        &mut self,
        idle: Duration,
        timeout: Duration,
        is_active: impl FnMut() -> bool + Send + 'static,
        bypass: impl FnMut() -> bool + Send + 'static,
    ) -> &mut Self {
        let clock = self.clock();
        self.node(SleepUntilIdle::new(idle, timeout, clock, is_active).with_bypass(bypass))
    }

    /// Waits for an event of type `E` matching `predicate`.
    ///
    /// Records [`BuildError::MissingEventBus`] if no bus was configured.
    pub fn sleep_until_event<E: Any>(
        &mut self,
        timeout: Duration,
        predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        let Some(bus) = self.event_bus.clone() else {
            self.record(BuildError::MissingEventBus);
            return self;
        };
        let clock = self.clock();
        self.node(SleepUntilEvent::new(bus, timeout, clock, predicate))
    }

    /// Embeds an already built tree.
    pub fn subtree(&mut self, name: impl Into<String>, tree: BehaviorTree) -> &mut Self {
        self.node(SubTree::new(name, move || tree.into_root()))
    }

    /// Embeds a tree built lazily by `supplier` on first use.
    pub fn subtree_with(
        &mut self,
        name: impl Into<String>,
        supplier: impl FnOnce() -> BehaviorTree + Send + 'static,
    ) -> &mut Self {
        self.node(SubTree::new(name, move || supplier().into_root()))
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn info(&mut self, mut message: impl FnMut() -> String + Send + 'static) -> &mut Self {
        self.succeed_then("Info", move || tracing::info!("{}", message()))
    }

    pub fn debug(&mut self, mut message: impl FnMut() -> String + Send + 'static) -> &mut Self {
        self.succeed_then("Debug", move || tracing::debug!("{}", message()))
    }

    pub fn warn(&mut self, mut message: impl FnMut() -> String + Send + 'static) -> &mut Self {
        self.succeed_then("Warn", move || tracing::warn!("{}", message()))
    }

    pub fn error(&mut self, mut message: impl FnMut() -> String + Send + 'static) -> &mut Self {
        self.succeed_then("Error", move || tracing::error!("{}", message()))
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

/// Pops pending decorators innermost-first, each wrapping the result so far.
fn wrap(mut node: BoxedNode, decorators: &mut Vec<Box<dyn Decorator>>) -> BoxedNode {
    while let Some(mut decorator) = decorators.pop() {
        decorator.assign_child(node);
        node = decorator;
    }
    node
}
