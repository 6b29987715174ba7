//! Core node traits.
//!
//! This module defines the [`Node`] trait, the capability every tree node
//! implements, along with the two assembly seams used by the builder:
//! [`Composite`] (ordered children) and [`Decorator`] (a single child).

use crate::Status;

/// An owned, dynamically dispatched node.
pub type BoxedNode = Box<dyn Node>;

/// A behavior tree node.
///
/// Nodes own their children and any private execution state. A tree is
/// ticked from a single thread at a time, so `tick` takes `&mut self`.
pub trait Node: Send {
    /// Evaluate this node once.
    ///
    /// Must return within the current call. Long-running work returns
    /// [`Status::Running`] and is resumed by a later tick.
    fn tick(&mut self) -> Status;

    /// Rewind this node's private state and reset every owned child.
    ///
    /// Idempotent, and safe to call on a node that never ran. Resetting is
    /// also how a subtree is cancelled.
    fn reset(&mut self);

    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str;
}

/// Blanket implementation for boxed nodes.
///
/// This allows `Box<dyn Node>` to be used wherever a `Node` is expected,
/// enabling heterogeneous child lists.
impl Node for BoxedNode {
    #[inline]
    fn tick(&mut self) -> Status {
        (**self).tick()
    }

    #[inline]
    fn reset(&mut self) {
        (**self).reset()
    }

    #[inline]
    fn name(&self) -> &str {
        (**self).name()
    }
}

/// A node with an ordered list of owned children.
pub trait Composite: Node {
    /// Appends a child after the existing ones.
    fn add_child(&mut self, child: BoxedNode);

    /// Number of attached children.
    fn len(&self) -> usize;

    /// Returns `true` if no children are attached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A node that wraps exactly one owned child.
pub trait Decorator: Node {
    /// Attaches the child, replacing any previous one.
    fn assign_child(&mut self, child: BoxedNode);
}
