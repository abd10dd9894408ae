//! Bottom-up, lock-coupled AVL height maintenance.
//!
//! The rebalancer walks from a starting node toward the root sentinel,
//! repairing recorded heights and restoring `|bf| <= 1` where
//! `bf = height(left) - height(right)`. At each step it holds a sliding
//! window of locks, acquired strictly top-down: parent, focus node, and —
//! when a rotation is due — the heavier child and possibly a grandchild.
//! Windows slide upward, so a competitor wanting the same nodes must take
//! the topmost first; no cycle of waits can form between two windows.
//!
//! Each iteration re-reads `node.parent` under the parent's lock. A
//! mismatch means a concurrent rotation re-parented the focus; the walk
//! re-reads and retries, or aborts if the focus was marked — another thread
//! then owns the repair of that region.
//!
//! Heights read while choosing a rotation may lag. That at worst costs a
//! redundant iteration, never a wrong rotation: all pointer moves happen
//! with every involved node locked, and heights are recomputed from the
//! locked children before the window is released.

use seize::LocalGuard;

use crate::node::{ChildDir, Node};
use crate::tracing_helpers::{debug_log, trace_log};

use super::AvlSet;

/// A node with `bf < MINBF` is right-heavy.
const MINBF: i32 = -1;

/// A node with `bf > MAXBF` is left-heavy.
const MAXBF: i32 = 1;

impl AvlSet {
    /// Walk upward from `from`, repairing heights and balance.
    ///
    /// Terminates when the walk reaches the root sentinel, when a locked
    /// node turns out to be marked, or when the focus subtree's height
    /// matches what its parent last accounted for and its balance factor is
    /// acceptable — nothing above can need repair from this call. After a
    /// rotation the same rule applies: a rotation that restored the
    /// subtree's prior height (the insert case) ends the walk, while one
    /// that shrank it (the removal case) climbs on so ancestors converge to
    /// exact heights at quiescence.
    pub(crate) fn rebalance(&self, from: *mut Node, _guard: &LocalGuard<'_>) {
        let root: *mut Node = self.root_ptr();
        let mut node: *mut Node = from;

        if node == root {
            return;
        }

        // SAFETY throughout: every dereferenced pointer is either the
        // sentinel (owned by the tree) or protected by the caller's guard;
        // link reads used for decisions are re-validated under locks.
        unsafe {
            let mut parent: *mut Node = (*node).parent();

            while node != root {
                debug_assert!(!parent.is_null(), "non-sentinel node with null parent");

                (*parent).lock();

                // The shape may have changed while the lock was awaited.
                if (*node).parent() != parent {
                    (*parent).unlock();
                    if (*node).is_marked() {
                        // A remover owns this region now.
                        return;
                    }
                    trace_log!("rebalance focus re-parented; retrying window");
                    parent = (*node).parent();
                    continue;
                }

                (*node).lock();
                if (*node).is_marked() {
                    (*node).unlock();
                    (*parent).unlock();
                    return;
                }

                let left: *mut Node = (*node).left();
                let right: *mut Node = (*node).right();
                let left_height: i32 = Node::height_of(left);
                let right_height: i32 = Node::height_of(right);

                let curr_height: i32 = 1 + left_height.max(right_height);
                let prev_height: i32 = (*node).height();
                let bf: i32 = left_height - right_height;

                if curr_height != prev_height {
                    (*node).set_height(curr_height);
                } else if (MINBF..=MAXBF).contains(&bf) {
                    // Height stable and balance acceptable: the subtree
                    // above cannot need repair from this call.
                    (*node).unlock();
                    (*parent).unlock();
                    return;
                }

                if bf < MINBF {
                    // Right subtree too tall.
                    let child: *mut Node = right;
                    (*child).lock();

                    let child_bf: i32 =
                        Node::height_of((*child).left()) - Node::height_of((*child).right());

                    if child_bf > 0 {
                        // Inner grandchild becomes the new subtree root.
                        let grand: *mut Node = (*child).left();
                        (*grand).lock();

                        debug_log!("right-left double rotation");
                        rotate_right(grand, child, node);
                        rotate_left(grand, node, parent);
                        let new_height: i32 = (*grand).height();

                        (*child).unlock();
                        (*node).unlock();
                        (*grand).unlock();
                        (*parent).unlock();

                        if new_height == prev_height {
                            return;
                        }
                    } else {
                        debug_log!("left rotation");
                        rotate_left(child, node, parent);
                        let new_height: i32 = (*child).height();

                        (*node).unlock();
                        (*child).unlock();
                        (*parent).unlock();

                        if new_height == prev_height {
                            return;
                        }
                    }

                    // The rotated subtree is exact and balanced, but its
                    // height differs from what the parent last accounted
                    // for: keep climbing from the parent.
                    node = parent;
                    parent = (*node).parent();
                } else if bf > MAXBF {
                    // Left subtree too tall.
                    let child: *mut Node = left;
                    (*child).lock();

                    let child_bf: i32 =
                        Node::height_of((*child).left()) - Node::height_of((*child).right());

                    if child_bf < 0 {
                        let grand: *mut Node = (*child).right();
                        (*grand).lock();

                        debug_log!("left-right double rotation");
                        rotate_left(grand, child, node);
                        rotate_right(grand, node, parent);
                        let new_height: i32 = (*grand).height();

                        (*node).unlock();
                        (*child).unlock();
                        (*grand).unlock();
                        (*parent).unlock();

                        if new_height == prev_height {
                            return;
                        }
                    } else {
                        debug_log!("right rotation");
                        rotate_right(child, node, parent);
                        let new_height: i32 = (*child).height();

                        (*node).unlock();
                        (*child).unlock();
                        (*parent).unlock();

                        if new_height == prev_height {
                            return;
                        }
                    }

                    node = parent;
                    parent = (*node).parent();
                } else {
                    // Height changed but balance holds: keep climbing.
                    (*node).unlock();
                    (*parent).unlock();

                    node = parent;
                    parent = (*node).parent();
                }
            }
        }
    }
}

// ============================================================================
//  Rotations
// ============================================================================

/// Rotate `node` to the left; `child` (its right child) takes its place.
///
/// # Safety
///
/// `parent.lock`, `node.lock`, and `child.lock` must all be held, with
/// `child == node.right` non-null and `parent` the current parent of
/// `node`. Pointers must be guard-protected.
unsafe fn rotate_left(child: *mut Node, node: *mut Node, parent: *mut Node) {
    // SAFETY: all three nodes locked per contract.
    unsafe {
        // The child's left subtree crosses over to node's right.
        let temp: *mut Node = (*child).left();
        (*node).set_child(ChildDir::Right, temp);
        if !temp.is_null() {
            (*temp).set_parent(node);
        }

        (*child).set_child(ChildDir::Left, node);

        // Redirect whichever parent slot held node.
        if (*parent).right() == node {
            (*parent).set_child(ChildDir::Right, child);
        } else {
            (*parent).set_child(ChildDir::Left, child);
        }

        (*child).set_parent(parent);
        (*node).set_parent(child);

        // Recompute heights bottom-up from the locked children.
        let node_height: i32 =
            1 + Node::height_of((*node).left()).max(Node::height_of((*node).right()));
        (*node).set_height(node_height);

        let child_height: i32 =
            1 + Node::height_of((*child).left()).max(Node::height_of((*child).right()));
        (*child).set_height(child_height);
    }
}

/// Rotate `node` to the right; `child` (its left child) takes its place.
///
/// # Safety
///
/// Same contract as [`rotate_left`], with `child == node.left`.
unsafe fn rotate_right(child: *mut Node, node: *mut Node, parent: *mut Node) {
    // SAFETY: all three nodes locked per contract.
    unsafe {
        let temp: *mut Node = (*child).right();
        (*node).set_child(ChildDir::Left, temp);
        if !temp.is_null() {
            (*temp).set_parent(node);
        }

        (*child).set_child(ChildDir::Right, node);

        if (*parent).right() == node {
            (*parent).set_child(ChildDir::Right, child);
        } else {
            (*parent).set_child(ChildDir::Left, child);
        }

        (*child).set_parent(parent);
        (*node).set_parent(child);

        let node_height: i32 =
            1 + Node::height_of((*node).left()).max(Node::height_of((*node).right()));
        (*node).set_height(node_height);

        let child_height: i32 =
            1 + Node::height_of((*child).left()).max(Node::height_of((*child).right()));
        (*child).set_height(child_height);
    }
}

// ============================================================================
//  Tests
// ============================================================================
