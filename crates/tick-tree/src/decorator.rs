//! Decorator nodes.
//!
//! Decorators wrap a single child and change its result or its timing. This
//! module provides [`Inverter`] (NOT logic), [`Repeater`], [`RetryUntilSuccess`],
//! [`Cooldown`], [`SuccessRate`] and [`Timeout`].
//!
//! A decorator with no child attached fails on every tick instead of
//! panicking, so a partially assembled tree keeps the tick loop alive.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::{BoxedNode, Decorator, Node, SharedClock, Status};

/// Implements `name`, `assign_child` and `with_child` for a decorator with
/// `name: String` and `child: Option<BoxedNode>` fields.
macro_rules! decorator_child {
    ($ty:ty) => {
        impl $ty {
            /// Attaches `child`, replacing any previous one.
            pub fn with_child(mut self, child: BoxedNode) -> Self {
                self.child = Some(child);
                self
            }

            pub fn with_name(mut self, name: impl Into<String>) -> Self {
                self.name = name.into();
                self
            }
        }

        impl Decorator for $ty {
            fn assign_child(&mut self, child: BoxedNode) {
                self.child = Some(child);
            }
        }
    };
}

/// Inverts the result of its child.
///
/// # Semantics
///
/// - `Success` becomes `Failure` and vice versa
/// - `Running` is passed through
pub struct Inverter {
    name: String,
    child: Option<BoxedNode>,
}

impl Inverter {
    pub fn new() -> Self {
        Self {
            name: "Inverter".to_string(),
            child: None,
        }
    }
}

impl Default for Inverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Node for Inverter {
    fn tick(&mut self) -> Status {
        self.child
            .as_mut()
            .map_or(Status::Failure, |child| child.tick().invert())
    }

    fn reset(&mut self) {
        if let Some(child) = &mut self.child {
            child.reset();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

decorator_child!(Inverter);

/// Re-runs its child a fixed number of times, or forever.
///
/// # Semantics
///
/// Each time the child finishes, with either `Success` or `Failure`, it is
/// reset and one repetition is counted. Once `max_repeats` repetitions have
/// completed the repeater returns `Success`; until then it returns `Running`.
/// With no limit it never finishes on its own.
pub struct Repeater {
    name: String,
    child: Option<BoxedNode>,
    max_repeats: Option<u32>,
    count: u32,
}

impl Repeater {
    /// `None` repeats forever.
    pub fn new(max_repeats: Option<u32>) -> Self {
        Self {
            name: "Repeater".to_string(),
            child: None,
            max_repeats,
            count: 0,
        }
    }

    /// Number of completed repetitions since the last reset.
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Node for Repeater {
    fn tick(&mut self) -> Status {
        let Some(child) = &mut self.child else {
            return Status::Failure;
        };

        match child.tick() {
            Status::Running => Status::Running,
            Status::Success | Status::Failure => {
                self.count = self.count.saturating_add(1);
                child.reset();
                match self.max_repeats {
                    Some(max) if self.count >= max => Status::Success,
                    _ => Status::Running,
                }
            }
        }
    }

    fn reset(&mut self) {
        if let Some(child) = &mut self.child {
            child.reset();
        }
        self.count = 0;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

decorator_child!(Repeater);

/// Retries its child until it succeeds.
///
/// # Semantics
///
/// - `Success` is returned immediately
/// - `Running` is passed through
/// - `Failure` counts one attempt. When `max_attempts` is reached the
///   decorator fails; otherwise the child is reset and `Running` is returned
///   so the retry happens on a later tick.
pub struct RetryUntilSuccess {
    name: String,
    child: Option<BoxedNode>,
    max_attempts: Option<u32>,
    attempts: u32,
}

impl RetryUntilSuccess {
    /// `None` retries forever.
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self {
            name: "RetryUntilSuccess".to_string(),
            child: None,
            max_attempts,
            attempts: 0,
        }
    }

    /// Failed attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Node for RetryUntilSuccess {
    fn tick(&mut self) -> Status {
        let Some(child) = &mut self.child else {
            return Status::Failure;
        };

        match child.tick() {
            Status::Success => Status::Success,
            Status::Running => Status::Running,
            Status::Failure => {
                self.attempts = self.attempts.saturating_add(1);
                match self.max_attempts {
                    Some(max) if self.attempts >= max => {
                        tracing::debug!(
                            node = %self.name,
                            attempts = self.attempts,
                            "retries exhausted"
                        );
                        Status::Failure
                    }
                    _ => {
                        child.reset();
                        Status::Running
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        if let Some(child) = &mut self.child {
            child.reset();
        }
        self.attempts = 0;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

decorator_child!(RetryUntilSuccess);

/// Enforces a minimum delay between runs of its child.
///
/// # Semantics
///
/// The first run is allowed immediately. While the child runs its status is
/// passed through. When it finishes, the child is reset and the next run is
/// blocked until the cooldown has elapsed **from the completion time**. Ticks
/// during the cooldown return `Running` without ticking the child.
///
/// The delay comes from a supplier that is consulted on every blocked tick,
/// so [`Cooldown::from_fn`] can lengthen or shorten a wait already in progress.
pub struct Cooldown {
    name: String,
    child: Option<BoxedNode>,
    cooldown: Box<dyn FnMut() -> Duration + Send>,
    clock: SharedClock,
    running_child: bool,
    completed_at: Option<Duration>,
}

impl Cooldown {
    pub fn new(cooldown: Duration, clock: SharedClock) -> Self {
        Self::from_fn(move || cooldown, clock)
            .with_name(format!("Cooldown({}ms)", cooldown.as_millis()))
    }

    /// Creates a cooldown whose delay is read from `cooldown` when needed.
    pub fn from_fn(cooldown: impl FnMut() -> Duration + Send + 'static, clock: SharedClock) -> Self {
        Self {
            name: "Cooldown".to_string(),
            child: None,
            cooldown: Box::new(cooldown),
            clock,
            running_child: false,
            completed_at: None,
        }
    }
}

impl Node for Cooldown {
    fn tick(&mut self) -> Status {
        let Some(child) = &mut self.child else {
            return Status::Failure;
        };

        if !self.running_child {
            if let Some(completed_at) = self.completed_at
                && self.clock.now().saturating_sub(completed_at) < (self.cooldown)()
            {
                return Status::Running;
            }
            self.running_child = true;
        }

        let status = child.tick();
        if status.is_terminal() {
            child.reset();
            self.running_child = false;
            let completed_at = self.clock.now();
            tracing::trace!(node = %self.name, ?completed_at, "cooldown armed");
            self.completed_at = Some(completed_at);
        }
        status
    }

    fn reset(&mut self) {
        if let Some(child) = &mut self.child {
            child.reset();
        }
        self.running_child = false;
        self.completed_at = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

decorator_child!(Cooldown);

/// Lets its child run only with a given probability.
///
/// # Semantics
///
/// Evaluated fresh on every tick, with the chance read from its supplier:
/// - `chance <= 0.0` (or NaN): fails without ticking the child
/// - `chance >= 1.0`: ticks the child and returns its status
/// - otherwise a uniform draw in `[0, 1)` is taken and the child is ticked
///   only if the draw is `<= chance`
pub struct SuccessRate {
    name: String,
    child: Option<BoxedNode>,
    chance: Box<dyn FnMut() -> f32 + Send>,
    rng: Box<dyn RngCore + Send>,
}

impl SuccessRate {
    /// Creates a gate seeded from the operating system.
    pub fn new(chance: f32) -> Self {
        Self::with_rng(chance, StdRng::from_os_rng())
    }

    /// Creates a gate drawing from `rng`.
    pub fn with_rng(chance: f32, rng: impl RngCore + Send + 'static) -> Self {
        Self::from_fn(move || chance, rng).with_name(format!("SuccessRate({chance})"))
    }

    /// Creates a gate that asks `chance` for the probability on every tick.
    pub fn from_fn(
        chance: impl FnMut() -> f32 + Send + 'static,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        Self {
            name: "SuccessRate".to_string(),
            child: None,
            chance: Box::new(chance),
            rng: Box::new(rng),
        }
    }
}

impl Node for SuccessRate {
    fn tick(&mut self) -> Status {
        let chance = (self.chance)();
        if chance.is_nan() || chance <= 0.0 {
            return Status::Failure;
        }
        if chance < 1.0 && self.rng.random::<f32>() > chance {
            return Status::Failure;
        }
        self.child
            .as_mut()
            .map_or(Status::Failure, |child| child.tick())
    }

    fn reset(&mut self) {
        if let Some(child) = &mut self.child {
            child.reset();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

decorator_child!(SuccessRate);

/// Gives its child a bounded amount of time to succeed.
///
/// # Semantics
///
/// The clock starts on the first tick after a reset. Each tick:
/// - `Success` resets the decorator and is returned
/// - `Failure` resets the child so the next tick starts a fresh attempt
/// - once `limit` has elapsed without a success the decorator resets and
///   fails; otherwise it returns `Running`
pub struct Timeout {
    name: String,
    child: Option<BoxedNode>,
    limit: Duration,
    clock: SharedClock,
    started_at: Option<Duration>,
}

impl Timeout {
    pub fn new(limit: Duration, clock: SharedClock) -> Self {
        Self {
            name: format!("Timeout({}ms)", limit.as_millis()),
            child: None,
            limit,
            clock,
            started_at: None,
        }
    }
}

impl Node for Timeout {
    fn tick(&mut self) -> Status {
        let Some(child) = &mut self.child else {
            return Status::Failure;
        };
        let started_at = *self.started_at.get_or_insert_with(|| self.clock.now());

        let status = child.tick();
        if status.is_success() {
            child.reset();
            self.started_at = None;
            return Status::Success;
        }

        let elapsed = self.clock.now().saturating_sub(started_at);
        if elapsed >= self.limit {
            tracing::debug!(node = %self.name, ?elapsed, "timed out");
            child.reset();
            self.started_at = None;
            return Status::Failure;
        }

        if status.is_failure() {
            child.reset();
        }
        Status::Running
    }

    fn reset(&mut self) {
        if let Some(child) = &mut self.child {
            child.reset();
        }
        self.started_at = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

decorator_child!(Timeout);
