//! Tree façade driven by the host loop.

use crate::{BoxedNode, Builder, Node, Result, RunConfig, RunError, Status};

/// Owns a root node and exposes the operations a host loop needs.
///
/// Dropping the tree drops the whole subtree, which also cancels any
/// outstanding event subscriptions.
pub struct BehaviorTree {
    root: BoxedNode,
}

impl BehaviorTree {
    pub fn from_root(root: BoxedNode) -> Self {
        Self { root }
    }

    /// Create a new tree builder.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Build a tree with a default [`Builder`].
    ///
    /// Use [`Builder::build_with`] to configure a clock, event bus or seed.
    pub fn build(block: impl FnOnce(&mut Builder)) -> Result<Self> {
        Builder::new().build_with(block)
    }

    /// Tick the root once.
    pub fn tick(&mut self) -> Status {
        let status = self.root.tick();
        tracing::trace!(root = self.root.name(), %status, "tick");
        status
    }

    /// Tick until the root reports a terminal status and return it.
    ///
    /// Spins without pausing; a tree that never settles never returns. Use
    /// [`BehaviorTree::run_with`] to bound the loop.
    pub fn run(&mut self) -> Status {
        loop {
            let status = self.tick();
            if status.is_terminal() {
                return status;
            }
        }
    }

    /// Like [`BehaviorTree::run`], honouring the limits in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::TickLimitExceeded`] if the tree is still running
    /// after `config.max_ticks` ticks. The tree is left as is; call
    /// [`BehaviorTree::reset`] to cancel it.
    pub fn run_with(&mut self, config: &RunConfig) -> Result<Status, RunError> {
        let mut ticks: u64 = 0;
        loop {
            let status = self.tick();
            ticks += 1;

            if status.is_terminal() {
                tracing::debug!(root = self.root.name(), ticks, %status, "run finished");
                return Ok(status);
            }

            if let Some(limit) = config.max_ticks
                && ticks >= limit
            {
                return Err(RunError::TickLimitExceeded { limit });
            }

            if let Some(interval) = config.tick_interval {
                std::thread::sleep(interval);
            }
        }
    }

    /// One step of a host polling loop: tick once, and reset after a
    /// terminal status so the next poll starts a fresh pass.
    pub fn poll(&mut self) -> Status {
        let status = self.tick();
        if status.is_terminal() {
            self.reset();
        }
        status
    }

    /// Rewind every node in the tree. Also cancels in-flight work.
    pub fn reset(&mut self) {
        self.root.reset();
    }

    pub fn root(&self) -> &dyn Node {
        &*self.root
    }

    pub fn root_mut(&mut self) -> &mut dyn Node {
        &mut *self.root
    }

    /// Release the root, e.g. to embed it in another tree.
    pub fn into_root(self) -> BoxedNode {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_nodes::Scripted;
    use Status::{Failure, Running, Success};

    #[test]
    fn run_ticks_until_terminal() {
        let (scripted, stats) = Scripted::boxed("worker", &[Running, Running, Failure]);
        let mut tree = BehaviorTree::from_root(scripted);

        assert_eq!(tree.run(), Failure);
        assert_eq!(stats.ticks(), 3);
    }

    #[test]
    fn run_with_respects_tick_limit() {
        let (scripted, stats) = Scripted::boxed("stuck", &[Running]);
        let mut tree = BehaviorTree::from_root(scripted);
        let config = RunConfig::new().with_max_ticks(5);

        assert_eq!(
            tree.run_with(&config),
            Err(RunError::TickLimitExceeded { limit: 5 })
        );
        assert_eq!(stats.ticks(), 5);
    }

    #[test]
    fn run_with_returns_terminal_status() {
        let (scripted, _) = Scripted::boxed("worker", &[Running, Success]);
        let mut tree = BehaviorTree::from_root(scripted);

        assert_eq!(tree.run_with(&RunConfig::new().with_max_ticks(5)), Ok(Success));
    }

    #[test]
    fn poll_resets_after_terminal_status() {
        let (scripted, stats) = Scripted::boxed("worker", &[Running, Success]);
        let mut tree = BehaviorTree::from_root(scripted);

        assert_eq!(tree.poll(), Running);
        assert_eq!(stats.resets(), 0);
        assert_eq!(tree.poll(), Success);
        assert_eq!(stats.resets(), 1);
        assert_eq!(tree.poll(), Running);
    }
}
