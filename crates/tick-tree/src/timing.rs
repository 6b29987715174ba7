//! Time- and event-based wait leaves.
//!
//! All waits read time from an injected [`SharedClock`] and capture their
//! start on the first tick after construction or reset. None of them block:
//! they return `Running` until their condition or budget is settled.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::{EventBus, Node, SharedClock, Status, Subscription};

/// Returns `Running` until `duration` has elapsed since the first tick, then
/// `Success`.
pub struct Sleep {
    name: String,
    duration: Duration,
    clock: SharedClock,
    started_at: Option<Duration>,
}

impl Sleep {
    pub fn new(duration: Duration, clock: SharedClock) -> Self {
        Self {
            name: format!("Sleep({}ms)", duration.as_millis()),
            duration,
            clock,
            started_at: None,
        }
    }
}

impl Node for Sleep {
    fn tick(&mut self) -> Status {
        let now = self.clock.now();
        let started_at = *self.started_at.get_or_insert(now);
        if now.saturating_sub(started_at) < self.duration {
            Status::Running
        } else {
            Status::Success
        }
    }

    fn reset(&mut self) {
        self.started_at = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// How long a [`SleepUntil`] waits before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    /// Elapsed clock time since the first tick.
    Time(Duration),
    /// Number of unsatisfied ticks that may report `Running`.
    Ticks(u32),
}

impl From<Duration> for Budget {
    fn from(value: Duration) -> Self {
        Budget::Time(value)
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Budget::Time(duration) => write!(f, "{}ms", duration.as_millis()),
            Budget::Ticks(ticks) => write!(f, "{ticks} ticks"),
        }
    }
}

/// Waits for a predicate to hold, within a budget.
///
/// # Semantics
///
/// The predicate is checked first on every tick; if it holds the node
/// succeeds immediately. Otherwise it returns `Running` while budget remains
/// and `Failure` once the budget is spent.
pub struct SleepUntil {
    name: String,
    predicate: Box<dyn FnMut() -> bool + Send>,
    budget: Budget,
    clock: SharedClock,
    started_at: Option<Duration>,
    ticks_used: u32,
}

impl SleepUntil {
    pub fn new(
        budget: impl Into<Budget>,
        clock: SharedClock,
        predicate: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        let budget = budget.into();
        Self {
            name: format!("SleepUntil({budget})"),
            predicate: Box::new(predicate),
            budget,
            clock,
            started_at: None,
            ticks_used: 0,
        }
    }
}

impl Node for SleepUntil {
    fn tick(&mut self) -> Status {
        if (self.predicate)() {
            return Status::Success;
        }

        match self.budget {
            Budget::Time(limit) => {
                let now = self.clock.now();
                let started_at = *self.started_at.get_or_insert(now);
                if now.saturating_sub(started_at) < limit {
                    Status::Running
                } else {
                    Status::Failure
                }
            }
            Budget::Ticks(limit) => {
                if self.ticks_used < limit {
                    self.ticks_used += 1;
                    Status::Running
                } else {
                    Status::Failure
                }
            }
        }
    }

    fn reset(&mut self) {
        self.started_at = None;
        self.ticks_used = 0;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Waits until an activity predicate stays false for a continuous period.
///
/// # Semantics
///
/// - If `bypass` is set and returns `true`, succeeds immediately.
/// - Fails once more than `timeout` has elapsed since the first tick.
/// - Succeeds once `is_active` has reported `false` continuously for `idle`.
///   Any tick where it reports `true` restarts the idle timer; the overall
///   timeout keeps running.
pub struct SleepUntilIdle {
    name: String,
    is_active: Box<dyn FnMut() -> bool + Send>,
    bypass: Option<Box<dyn FnMut() -> bool + Send>>,
    idle: Duration,
    timeout: Duration,
    clock: SharedClock,
    started_at: Option<Duration>,
    idle_since: Option<Duration>,
}

impl SleepUntilIdle {
    pub fn new(
        idle: Duration,
        timeout: Duration,
        clock: SharedClock,
        is_active: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        Self {
            name: format!(
                "SleepUntilIdle({}ms, timeout={}ms)",
                idle.as_millis(),
                timeout.as_millis()
            ),
            is_active: Box::new(is_active),
            bypass: None,
            idle,
            timeout,
            clock,
            started_at: None,
            idle_since: None,
        }
    }

    /// Succeed immediately on any tick where `bypass` returns `true`.
    pub fn with_bypass(mut self, bypass: impl FnMut() -> bool + Send + 'static) -> Self {
        self.bypass = Some(Box::new(bypass));
        self
    }
}

impl Node for SleepUntilIdle {
    fn tick(&mut self) -> Status {
        if let Some(bypass) = &mut self.bypass
            && bypass()
        {
            return Status::Success;
        }

        let now = self.clock.now();
        let started_at = *self.started_at.get_or_insert(now);
        if now.saturating_sub(started_at) > self.timeout {
            return Status::Failure;
        }

        if (self.is_active)() {
            self.idle_since = None;
            return Status::Running;
        }

        let idle_since = *self.idle_since.get_or_insert(now);
        if now.saturating_sub(idle_since) >= self.idle {
            Status::Success
        } else {
            Status::Running
        }
    }

    fn reset(&mut self) {
        self.started_at = None;
        self.idle_since = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Waits for a matching event of type `E` to be published, within a timeout.
///
/// # Semantics
///
/// The first tick subscribes to `E` on the bus and starts the timeout. The
/// subscription handler runs on the publishing thread and only raises a
/// shared flag; ticks read that flag without blocking. On a match the node
/// unsubscribes and succeeds, on timeout it unsubscribes and fails.
///
/// Resetting unsubscribes and swaps in a fresh flag, so a handler that is
/// still in flight cannot mark the reset node as matched.
pub struct SleepUntilEvent<E> {
    name: String,
    bus: EventBus,
    clock: SharedClock,
    timeout: Duration,
    predicate: Arc<dyn Fn(&E) -> bool + Send + Sync>,
    matched: Arc<AtomicBool>,
    subscription: Option<Subscription>,
    started_at: Option<Duration>,
}

impl<E: Any> SleepUntilEvent<E> {
    pub fn new(
        bus: EventBus,
        timeout: Duration,
        clock: SharedClock,
        predicate: impl Fn(&E) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: format!(
                "SleepUntilEvent({}, timeout={}ms)",
                short_type_name(std::any::type_name::<E>()),
                timeout.as_millis()
            ),
            bus,
            clock,
            timeout,
            predicate: Arc::new(predicate),
            matched: Arc::new(AtomicBool::new(false)),
            subscription: None,
            started_at: None,
        }
    }

    /// Returns `true` while a bus subscription is held.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    fn subscribe(&mut self) {
        let matched = Arc::clone(&self.matched);
        let predicate = Arc::clone(&self.predicate);
        self.subscription = Some(self.bus.subscribe(move |event: &E| {
            if !matched.load(Ordering::Acquire) && predicate(event) {
                matched.store(true, Ordering::Release);
            }
        }));
        tracing::debug!(node = %self.name, "subscribed");
    }

    fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

/// Strips module paths from a type name while keeping its generic arguments,
/// so `app::Wrapper<app::events::Bar>` becomes `Wrapper<Bar>`.
fn short_type_name(full: &str) -> String {
    fn last_segment(path: &str) -> &str {
        path.rsplit("::").next().unwrap_or(path)
    }

    let mut short = String::with_capacity(full.len());
    let mut start = 0;
    for (i, c) in full.char_indices() {
        if matches!(c, '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';') {
            short.push_str(last_segment(&full[start..i]));
            short.push(c);
            start = i + c.len_utf8();
        }
    }
    short.push_str(last_segment(&full[start..]));
    short
}

impl<E: Any> Node for SleepUntilEvent<E> {
    fn tick(&mut self) -> Status {
        let now = self.clock.now();
        let started_at = *self.started_at.get_or_insert(now);

        if self.matched.load(Ordering::Acquire) {
            self.unsubscribe();
            tracing::debug!(node = %self.name, "event matched");
            return Status::Success;
        }

        if self.subscription.is_none() {
            self.subscribe();
        }

        if now.saturating_sub(started_at) >= self.timeout {
            self.unsubscribe();
            tracing::debug!(node = %self.name, "timed out waiting for event");
            return Status::Failure;
        }

        Status::Running
    }

    fn reset(&mut self) {
        self.unsubscribe();
        self.matched = Arc::new(AtomicBool::new(false));
        self.started_at = None;
    }

    fn name(&self) -> &str {
        &self.name
    }
}
