//! `AvlSet` - a concurrent AVL set over `i64` keys.
//!
//! This module provides the main [`AvlSet`] type. Mutations use fine-grained
//! per-node locking; lookups are lock-free. Unlinked nodes are retired
//! through a [`seize::Collector`] so readers can finish traversing them.
//!
//! # Write Protocol
//!
//! ```text
//! 1. guard = tree.guard()                 // Enter protected region
//! 2. Seek target position (lock-free)
//! 3. LockManager::lock(..)                // Parent first, then down
//! 4. Validate: mark / child-slot snapshot → retry on failure
//! 5. Mutate links (mark store or child publish = linearization point)
//! 6. unlock_all()
//! 7. Rebalance upward (sliding lock window)
//! 8. drop(guard)
//! ```

use std::fmt as StdFmt;
use std::ptr::NonNull;

use seize::{Collector, Guard, LocalGuard};

use crate::node::Node;
use crate::reclaim::{reclaim_node_boxed, teardown_subtree};

mod insert;
mod rebalance;
mod remove;
mod seek;
mod validate;


// ============================================================================
//  AvlSet
// ============================================================================

/// A concurrent ordered set of `i64` keys.
///
/// Backed by an AVL tree with a per-node mutex, logical-deletion marks, and
/// bottom-up lock-coupled rebalancing. Many threads may traverse and mutate
/// disjoint regions in parallel; `contains` never blocks.
///
/// The tree exposes no iterator, size, or bulk operations.
///
/// # Example
///
/// ```
/// use cavl::AvlSet;
///
/// let set = AvlSet::new();
/// assert!(set.insert(3));
/// assert!(!set.insert(3));
/// assert!(set.contains(3));
/// assert!(set.remove(3));
/// assert!(!set.contains(3));
/// ```
pub struct AvlSet {
    /// Memory reclamation domain for unlinked nodes.
    collector: Collector,

    /// The permanent root sentinel. Its `left` child is the entire real
    /// tree; its `right` is always null. Never marked, never removed.
    root: NonNull<Node>,
}

// SAFETY: all shared state behind the raw pointers is synchronized by the
// per-node locks, atomics with acquire/release ordering, and the collector.
unsafe impl Send for AvlSet {}
// SAFETY: as above; `&AvlSet` operations follow the locking protocol.
unsafe impl Sync for AvlSet {}

impl AvlSet {
    /// Create an empty set. Installs the root sentinel.
    #[must_use]
    pub fn new() -> Self {
        let root: *mut Node = Node::into_raw(Node::sentinel());

        Self {
            collector: Collector::new(),
            // SAFETY: Box::into_raw never returns null.
            root: unsafe { NonNull::new_unchecked(root) },
        }
    }

    /// Enter a protected region and return a guard.
    ///
    /// The guard keeps any node reachable during its lifetime from being
    /// freed. Every operation runs under one; the `*_with_guard` variants
    /// let callers amortize guard entry over a batch.
    #[must_use]
    #[inline]
    pub fn guard(&self) -> LocalGuard<'_> {
        self.collector.enter()
    }

    /// Membership test. Lock-free; linearizes at its load of the candidate
    /// node's mark (or at the final null-child observation when absent).
    #[must_use]
    #[inline]
    pub fn contains(&self, key: i64) -> bool {
        let guard: LocalGuard<'_> = self.guard();
        self.contains_with_guard(key, &guard)
    }

    /// Insert `key`. Returns true iff the key was absent and this call
    /// published it. Idempotent: inserting a present key returns false and
    /// allocates nothing.
    #[inline]
    pub fn insert(&self, key: i64) -> bool {
        let guard: LocalGuard<'_> = self.guard();
        self.insert_with_guard(key, &guard)
    }

    /// Remove `key`. Returns true iff the key was present and this call
    /// marked it. Removing an absent key is a no-op.
    #[inline]
    pub fn remove(&self, key: i64) -> bool {
        let guard: LocalGuard<'_> = self.guard();
        self.remove_with_guard(key, &guard)
    }

    // ========================================================================
    //  Internal helpers
    // ========================================================================

    /// The root sentinel pointer.
    #[inline]
    #[must_use]
    pub(crate) fn root_ptr(&self) -> *mut Node {
        self.root.as_ptr()
    }

    /// Hand an unlinked node to the reclaimer.
    ///
    /// # Safety
    ///
    /// - `node` must be marked and physically unlinked: unreachable from the
    ///   root by any new traversal.
    /// - `node` must not be retired twice.
    pub(crate) unsafe fn retire(&self, node: *mut Node, guard: &LocalGuard<'_>) {
        // SAFETY: caller guarantees node is unlinked and uniquely retired;
        // in-flight seeks that still reference it are covered by their
        // guards, which seize waits out before reclaiming.
        unsafe { guard.defer_retire(node, reclaim_node_boxed) };
    }
}

impl Default for AvlSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AvlSet {
    fn drop(&mut self) {
        // Callers guarantee no thread is mid-operation. Nodes already
        // retired are unreachable from the root and are reclaimed when the
        // collector drops; everything still linked is freed here.
        // SAFETY: quiescent per the destruction contract; root came from
        // Box::into_raw in `new`.
        unsafe { teardown_subtree(self.root.as_ptr()) };
    }
}

impl StdFmt::Debug for AvlSet {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("AvlSet").finish_non_exhaustive()
    }
}

// ============================================================================
//  Tests
// ============================================================================
