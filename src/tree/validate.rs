//! Quiescent diagnostics: structural invariant checks and ordered key dumps.
//!
//! Everything here assumes **quiescence** — no in-flight operation on any
//! thread. Heights are only guaranteed accurate at quiescence, and the
//! traversals take no locks. These methods exist for tests and harnesses;
//! the set deliberately exposes no iterator for concurrent use.

use crate::node::{Node, NULL_HEIGHT};

use super::AvlSet;

impl AvlSet {
    /// Collect every reachable key in order. Quiescent callers only.
    #[must_use]
    pub fn collect_inorder(&self) -> Vec<i64> {
        let mut keys: Vec<i64> = Vec::new();
        // SAFETY: quiescence per the module contract; the tree owns all
        // reachable nodes.
        unsafe { collect(self.top(), &mut keys) };
        keys
    }

    /// Check every structural invariant, panicking on the first violation:
    ///
    /// 1. BST order over reachable keys (strict, no duplicates).
    /// 2. Parent back-links agree with child links.
    /// 3. Recorded heights equal computed heights (null = -1).
    /// 4. Every balance factor is within `[-1, 1]`.
    /// 5. No reachable node is marked.
    ///
    /// Quiescent callers only.
    ///
    /// # Panics
    ///
    /// Panics if any invariant does not hold.
    pub fn assert_invariants(&self) {
        let top: *mut Node = self.top();
        if top.is_null() {
            return;
        }

        // SAFETY: quiescence per the module contract.
        unsafe {
            assert!(
                (*top).parent() == self.root_ptr(),
                "top node's parent is not the sentinel"
            );
            check(top, None, None);
        }
    }

    /// Key of the topmost real node, if any. Quiescent callers only.
    #[must_use]
    pub fn top_key(&self) -> Option<i64> {
        let top: *mut Node = self.top();
        if top.is_null() {
            None
        } else {
            // SAFETY: quiescence per the module contract.
            Some(unsafe { (*top).key() })
        }
    }

    /// Recorded height of the topmost real node, `-1` when empty.
    /// Quiescent callers only.
    #[must_use]
    pub fn real_height(&self) -> i32 {
        // SAFETY: quiescence per the module contract.
        unsafe { Node::height_of(self.top()) }
    }

    /// The sentinel's left child: the topmost real node or null.
    fn top(&self) -> *mut Node {
        // SAFETY: the sentinel is owned by the tree and always valid.
        unsafe { (*self.root_ptr()).left() }
    }
}

/// In-order DFS appending keys.
///
/// # Safety
///
/// Quiescent tree; `node` null or reachable.
unsafe fn collect(node: *mut Node, keys: &mut Vec<i64>) {
    if node.is_null() {
        return;
    }
    // SAFETY: non-null reachable node under quiescence.
    unsafe {
        collect((*node).left(), keys);
        keys.push((*node).key());
        collect((*node).right(), keys);
    }
}

/// Recursive invariant check; returns the computed height of `node`.
///
/// # Safety
///
/// Quiescent tree; `node` non-null and reachable.
unsafe fn check(node: *mut Node, lower: Option<i64>, upper: Option<i64>) -> i32 {
    // SAFETY: non-null reachable node under quiescence.
    unsafe {
        let n: &Node = &*node;
        let key: i64 = n.key();

        if let Some(lo) = lower {
            assert!(key > lo, "BST order violated: {key} <= lower bound {lo}");
        }
        if let Some(hi) = upper {
            assert!(key < hi, "BST order violated: {key} >= upper bound {hi}");
        }
        assert!(!n.is_marked(), "reachable node {key} is marked");

        let left: *mut Node = n.left();
        let right: *mut Node = n.right();

        let left_height: i32 = if left.is_null() {
            NULL_HEIGHT
        } else {
            assert!(
                (*left).parent() == node,
                "left child of {key} has a stale parent link"
            );
            check(left, lower, Some(key))
        };

        let right_height: i32 = if right.is_null() {
            NULL_HEIGHT
        } else {
            assert!(
                (*right).parent() == node,
                "right child of {key} has a stale parent link"
            );
            check(right, Some(key), upper)
        };

        let computed: i32 = 1 + left_height.max(right_height);
        assert!(
            n.height() == computed,
            "height of {key} is {} but computed {computed}",
            n.height()
        );

        let bf: i32 = left_height - right_height;
        assert!((-1..=1).contains(&bf), "balance factor of {key} is {bf}");

        computed
    }
}

// ============================================================================
//  Tests
// ============================================================================
