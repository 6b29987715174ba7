//! Tick-driven behavior tree engine.
//!
//! This library provides a deterministic, non-blocking behavior tree runtime.
//! The host owns the loop and calls [`BehaviorTree::tick`]; every node returns
//! within that call.
//!
//! - **Tri-state**: nodes report `Success`, `Failure` or `Running`
//! - **Owned state**: each node keeps its own progress until [`Node::reset`]
//! - **Reset is cancellation**: resetting a subtree rewinds it and drops any
//!   pending event subscriptions
//! - **Injected time and events**: timing nodes read a [`Clock`], event waits
//!   subscribe on an [`EventBus`]
//!
//! # Architecture
//!
//! - [`Node`]: Core trait for all nodes; [`Composite`] and [`Decorator`] are
//!   the assembly seams
//! - [`Status`]: Success, Failure or Running
//! - Composite nodes: [`Sequence`], [`Selector`], [`RandomSelector`], [`Parallel`], [`Switch`]
//! - Decorator nodes: [`Inverter`], [`Repeater`], [`RetryUntilSuccess`], [`Cooldown`], [`SuccessRate`],
//!   [`Timeout`]
//! - Leaves: [`Action`], [`Condition`], [`SubTree`], [`Sleep`], [`SleepUntil`],
//!   [`SleepUntilIdle`], [`SleepUntilEvent`]
//! - [`Builder`] and [`BehaviorTree`]: assembly and the host-facing façade

pub mod builder;
pub mod clock;
pub mod composite;
pub mod config;
pub mod decorator;
pub mod error;
pub mod event;
pub mod leaf;
pub mod node;
pub mod status;
pub mod timing;
pub mod tree;

#[cfg(test)]
mod test_nodes;

// Re-export core types for ergonomic API
pub use builder::Builder;
pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use composite::{Parallel, Policy, RandomSelector, Selector, Sequence, Switch};
pub use config::RunConfig;
pub use decorator::{Cooldown, Inverter, Repeater, RetryUntilSuccess, SuccessRate, Timeout};
pub use error::{BuildError, Result, RunError};
pub use event::{EventBus, Subscription};
pub use leaf::{Action, Condition, SubTree};
pub use node::{BoxedNode, Composite, Decorator, Node};
pub use status::Status;
pub use timing::{Budget, Sleep, SleepUntil, SleepUntilEvent, SleepUntilIdle};
pub use tree::BehaviorTree;
