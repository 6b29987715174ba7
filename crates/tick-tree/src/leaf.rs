//! Leaf nodes backed by caller-supplied closures.
//!
//! Closures passed to [`Action`] and [`Condition`] must be synchronous and
//! cheap enough to run on every tick. Panics inside them are not caught.

use crate::{BoxedNode, Node, Status};

/// Runs a closure that computes the status directly.
pub struct Action {
    name: String,
    action: Box<dyn FnMut() -> Status + Send>,
}

impl Action {
    pub fn new(name: impl Into<String>, action: impl FnMut() -> Status + Send + 'static) -> Self {
        Self {
            name: name.into(),
            action: Box::new(action),
        }
    }
}

impl Node for Action {
    #[inline]
    fn tick(&mut self) -> Status {
        (self.action)()
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        &self.name
    }
}

/// Maps a predicate to `Success` (true) or `Failure` (false). Never `Running`.
pub struct Condition {
    name: String,
    predicate: Box<dyn FnMut() -> bool + Send>,
}

impl Condition {
    pub fn new(name: impl Into<String>, predicate: impl FnMut() -> bool + Send + 'static) -> Self {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }
}

impl Node for Condition {
    #[inline]
    fn tick(&mut self) -> Status {
        Status::from((self.predicate)())
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wraps a lazily built subtree.
///
/// The supplier runs at most once, on the first tick, and the resulting root
/// is kept for the lifetime of the wrapper. Ticks and resets are delegated to
/// it; resetting before the first tick does not build the subtree.
pub struct SubTree {
    name: String,
    supplier: Option<Box<dyn FnOnce() -> BoxedNode + Send>>,
    root: Option<BoxedNode>,
}

impl SubTree {
    pub fn new(
        name: impl Into<String>,
        supplier: impl FnOnce() -> BoxedNode + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            supplier: Some(Box::new(supplier)),
            root: None,
        }
    }

    /// Returns `true` once the supplier has been invoked.
    pub fn is_built(&self) -> bool {
        self.root.is_some()
    }
}

impl Node for SubTree {
    fn tick(&mut self) -> Status {
        if self.root.is_none() {
            self.root = self.supplier.take().map(|supplier| supplier());
        }
        self.root.as_mut().map_or(Status::Failure, |root| root.tick())
    }

    fn reset(&mut self) {
        if let Some(root) = &mut self.root {
            root.reset();
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
