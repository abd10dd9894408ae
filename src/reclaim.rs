//! Reclaim helpers for seize-based memory reclamation.
//!
//! Removal unlinks nodes while lock-free seeks may still be traversing
//! them, so unlinked nodes are retired through the tree's [`Collector`]
//! rather than freed immediately. This module provides:
//!
//! - the single-node reclaimer passed to `guard.defer_retire()`,
//! - the subtree traversal used for tree teardown at drop time.

use seize::Collector;

use crate::node::Node;

/// Reclaim a boxed node (seize callback).
///
/// # Safety
///
/// - `ptr` must point to a valid `Node` allocated via `Box::into_raw`.
/// - Must only be called after seize determines no guard can still hold a
///   reference.
pub(crate) unsafe fn reclaim_node_boxed(ptr: *mut Node, _collector: &Collector) {
    // SAFETY: caller guarantees ptr is valid and from Box::into_raw;
    // seize ensures no readers remain.
    unsafe { drop(Box::from_raw(ptr)) };
}

/// Free every node in the subtree rooted at `root`, including `root`.
///
/// Iterative DFS over child links only; parent links are ignored.
///
/// # Safety
///
/// - `root` must be null or point to a valid `Node` from `Box::into_raw`.
/// - The subtree must be unreachable by any concurrent operation: this is
///   only called from `Drop`, when the caller guarantees quiescence.
pub(crate) unsafe fn teardown_subtree(root: *mut Node) {
    if root.is_null() {
        return;
    }

    let mut stack: Vec<*mut Node> = Vec::with_capacity(64);
    stack.push(root);

    while let Some(node) = stack.pop() {
        // SAFETY: every pointer pushed is a non-null live node; children are
        // read before their parent is freed.
        let (left, right) = unsafe { ((*node).left(), (*node).right()) };
        if !left.is_null() {
            stack.push(left);
        }
        if !right.is_null() {
            stack.push(right);
        }

        // SAFETY: node is a valid Box::into_raw allocation and nothing can
        // reach it again.
        unsafe { drop(Box::from_raw(node)) };
    }
}

// ============================================================================
//  Tests
// ============================================================================
