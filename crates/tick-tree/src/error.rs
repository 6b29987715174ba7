//! Error types for tree assembly and bounded runs.
//!
//! Structural mistakes are reported by [`Builder::build`](crate::Builder::build)
//! and never at tick time. Tick-time problems degrade to `Failure` instead.
use thiserror::Error;

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("root already set to {existing:?}; cannot also attach {rejected:?}")]
    RootAlreadySet { existing: String, rejected: String },

    #[error("{open} composite block(s) left open at build time")]
    UnclosedComposite { open: usize },

    #[error("close called with no open composite block")]
    UnbalancedClose,

    #[error("{count} decorator(s) declared without a child")]
    DanglingDecorators { count: usize },

    #[error("no root node defined; attach at least one node")]
    MissingRoot,

    #[error("event wait declared but the builder has no event bus")]
    MissingEventBus,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("tree still running after {limit} ticks")]
    TickLimitExceeded { limit: u64 },
}
