//! Lock-free descent and the membership test.
//!
//! A seek follows ordinary BST comparisons from the root sentinel without
//! taking any lock and never mutates. Whatever it observes is a hint: links
//! can change the instant after they are read, so every mutator re-validates
//! the seek's snapshot after locking (see `insert` / `remove`).
//!
//! A seek that falls off the tree additionally validates the *key interval*
//! of its landing slot: the bounding ancestors — the nodes where the
//! descent last turned left and last turned right — must both be unmarked.
//! A marked bound means the descent ran through a node mid-removal whose
//! neighborhood is being rebuilt (a two-child removal briefly detaches the
//! in-order successor), so the observed empty slot may not be where the key
//! belongs; the seek restarts from the root. Removers publish their last
//! link store after the mark store, so a descent that saw the rebuilt links
//! is guaranteed to see the mark.

use std::cmp::Ordering;
use std::ptr;

use seize::LocalGuard;

use crate::node::{ChildDir, Node};
use crate::tracing_helpers::trace_log;

use super::AvlSet;

// ============================================================================
//  SeekOutcome
// ============================================================================

/// Where a seek stopped.
#[derive(Debug, Clone, Copy)]
pub(super) enum SeekOutcome {
    /// A node with the probe key was visited.
    Found {
        /// The parent through which `node` was reached.
        parent: *mut Node,
        /// The node carrying the probe key (possibly marked).
        node: *mut Node,
        /// Direction from `parent` into `node`.
        dir: ChildDir,
    },

    /// The descent fell off the tree: the slot where the key would live was
    /// observed null, and both interval-bounding ancestors were unmarked.
    Slot {
        /// The prospective parent.
        node: *mut Node,
        /// The empty child slot of `node` where the key belongs.
        dir: ChildDir,
    },
}

impl AvlSet {
    /// Descend from the root sentinel toward `key`.
    ///
    /// Returns the last visited node whose subtree could contain `key`:
    /// either the node carrying the key, or the node whose null child slot
    /// the key would occupy. Never blocks and never mutates; restarts the
    /// descent when a fall-off slot's interval bound turns out marked.
    ///
    /// # Safety
    ///
    /// The caller must hold a collector guard for the duration of the seek
    /// and for as long as it dereferences the returned pointers.
    pub(super) unsafe fn seek(&self, key: i64) -> SeekOutcome {
        loop {
            let mut parent: *mut Node = self.root_ptr();
            let mut dir_into: ChildDir = ChildDir::Left;
            let mut node: *mut Node = self.root_ptr();

            // Interval bounds: where the descent last turned left (upper)
            // and last turned right (lower). Null = unbounded on that side.
            let mut upper_anc: *mut Node = ptr::null_mut();
            let mut lower_anc: *mut Node = ptr::null_mut();

            loop {
                // SAFETY: node is the sentinel or was read from a child
                // link under the caller's guard.
                let n: &Node = unsafe { &*node };

                let dir: ChildDir = match n.cmp_key(key) {
                    Ordering::Equal => {
                        return SeekOutcome::Found {
                            parent,
                            node,
                            dir: dir_into,
                        };
                    }
                    Ordering::Less => ChildDir::Left,
                    Ordering::Greater => ChildDir::Right,
                };

                let child: *mut Node = n.child(dir);
                if child.is_null() {
                    // SAFETY: bound pointers were visited on this descent
                    // and are protected by the caller's guard.
                    if unsafe { bound_is_marked(upper_anc) || bound_is_marked(lower_anc) } {
                        trace_log!(key, "seek crossed a mid-removal bound; restarting");
                        break;
                    }
                    return SeekOutcome::Slot { node, dir };
                }

                match dir {
                    ChildDir::Left => upper_anc = node,
                    ChildDir::Right => lower_anc = node,
                }

                parent = node;
                dir_into = dir;
                node = child;
            }
        }
    }

    /// Membership test using an explicit guard.
    ///
    /// Lock-free. Linearizes at the `mark` load on the candidate node, or at
    /// the validated null-child observation inside the seek when the key is
    /// absent: marks are monotone and child pointers are published after
    /// all other writes, so the observed state is a consistent point in the
    /// history.
    #[must_use]
    pub fn contains_with_guard(&self, key: i64, _guard: &LocalGuard<'_>) -> bool {
        // SAFETY: _guard is the collector guard required by seek.
        match unsafe { self.seek(key) } {
            SeekOutcome::Found { node, .. } => {
                // SAFETY: node is protected by the caller's guard.
                !unsafe { (*node).is_marked() }
            }
            SeekOutcome::Slot { .. } => false,
        }
    }
}

/// Whether an interval bound exists and is marked.
///
/// The sentinel bound (a null pointer) is never marked.
///
/// # Safety
///
/// `bound` must be null or guard-protected.
#[inline]
unsafe fn bound_is_marked(bound: *mut Node) -> bool {
    // SAFETY: non-null bounds are guard-protected per contract.
    !bound.is_null() && unsafe { (*bound).is_marked() }
}

// ============================================================================
//  Tests
// ============================================================================
