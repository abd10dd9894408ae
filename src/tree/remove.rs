//! Validated physical removal.
//!
//! A removal locks, in strict top-down order, the target's parent, the
//! target, and — when the target has two children — the in-order
//! successor's parent and the successor. Every fact the lock-free seek and
//! successor walk established is re-checked under the locks; a stale fact
//! releases and retries.
//!
//! The store that sets the target's mark is the operation's linearization
//! point. The physical relink publishes the parent's child slot last, so
//! lock-free readers never observe a half-built neighborhood.

use seize::LocalGuard;

use crate::lock_manager::LockManager;
use crate::node::{ChildDir, Node};
use crate::tracing_helpers::trace_log;

use super::seek::SeekOutcome;
use super::AvlSet;

/// Rebalance entry points produced by a removal.
///
/// A two-child removal repairs both the successor's old neighborhood and
/// its new one, in that order.
struct RestartPoints {
    first: *mut Node,
    second: Option<*mut Node>,
}

impl AvlSet {
    /// Remove `key` using an explicit guard.
    ///
    /// Returns true iff the key was present and this call marked it.
    pub fn remove_with_guard(&self, key: i64, guard: &LocalGuard<'_>) -> bool {
        let (target, restart) = loop {
            // SAFETY: guard is the collector guard required by seek.
            let outcome: SeekOutcome = unsafe { self.seek(key) };

            let (parent, target, dir) = match outcome {
                SeekOutcome::Found { parent, node, dir } => (parent, node, dir),
                SeekOutcome::Slot { .. } => return false,
            };

            // SAFETY: target is protected by the caller's guard.
            if unsafe { (*target).is_marked() } {
                // Another thread already removed it.
                return false;
            }

            let mut lm = LockManager::new();
            // SAFETY: parent is protected by the caller's guard.
            unsafe { lm.lock(parent) };

            // SAFETY: protected by the guard; locked above.
            let p: &Node = unsafe { &*parent };
            if p.is_marked() || p.child(dir) != target {
                trace_log!(key, "remove parent validation failed; retrying seek");
                lm.unlock_all();
                continue;
            }

            // SAFETY: target is protected by the guard.
            unsafe { lm.lock(target) };
            // SAFETY: locked above.
            let t: &Node = unsafe { &*target };
            if t.is_marked() {
                lm.unlock_all();
                return false;
            }

            // Both locks held: the back-link must agree with the child link.
            assert!(
                t.parent() == parent,
                "parent back-link inconsistent with child link under both locks"
            );

            let left: *mut Node = t.left();
            let right: *mut Node = t.right();

            let points: RestartPoints = if left.is_null() || right.is_null() {
                // SAFETY: lm holds parent and target.
                unsafe { self.splice_out(parent, target, dir, left, right, &mut lm) }
            } else {
                // SAFETY: lm holds parent and target; both children are
                // non-null and current under the target's lock.
                unsafe { self.relink_successor(parent, target, dir, left, right, &mut lm) }
            };

            break (target, points);
        };

        // All locks are released. Seek hints may still route readers
        // through the unlinked node; their guards keep it alive until the
        // reclaimer decides it is safe to free.
        // SAFETY: target was marked and unlinked above by this thread,
        // exactly once.
        unsafe { self.retire(target, guard) };

        self.rebalance(restart.first, guard);
        if let Some(second) = restart.second {
            self.rebalance(second, guard);
        }

        true
    }

    /// Splice out a target with zero or one child.
    ///
    /// Marks the target (linearization point), redirects the parent slot to
    /// the only child (or null), fixes the child's back-link, and releases
    /// every lock.
    ///
    /// # Safety
    ///
    /// `lm` holds the locks of `parent` and `target`, in that order;
    /// `left`/`right` are the target's children as read under its lock; all
    /// pointers are guard-protected.
    unsafe fn splice_out(
        &self,
        parent: *mut Node,
        target: *mut Node,
        dir: ChildDir,
        left: *mut Node,
        right: *mut Node,
        lm: &mut LockManager,
    ) -> RestartPoints {
        // SAFETY: locked per contract.
        unsafe {
            (*target).set_marked();

            let only: *mut Node = if left.is_null() { right } else { left };
            (*parent).set_child(dir, only);
            if !only.is_null() {
                // Child back-link writes follow the rotation convention of
                // not locking the child; readers of parent links re-validate
                // under locks.
                (*only).set_parent(parent);
            }
        }

        lm.unlock_all();

        RestartPoints {
            first: parent,
            second: None,
        }
    }

    /// Replace a two-child target by its in-order successor.
    ///
    /// Extends the lock window down to the successor's parent and the
    /// successor (still strictly top-down), re-validating the walk under
    /// those locks and re-walking on staleness. Marks the target, detaches
    /// the successor, grafts it into the target's place with the parent-slot
    /// store last, and releases every lock.
    ///
    /// # Safety
    ///
    /// `lm` holds the locks of `parent` and `target`, in that order;
    /// `left`/`right` are the target's (non-null) children as read under
    /// its lock; all pointers are guard-protected.
    unsafe fn relink_successor(
        &self,
        parent: *mut Node,
        target: *mut Node,
        dir: ChildDir,
        left: *mut Node,
        right: *mut Node,
        lm: &mut LockManager,
    ) -> RestartPoints {
        // Find and lock the successor window. The walk is lock-free; a
        // candidate that fails validation releases only the successor-side
        // locks before re-walking. The walk cannot starve forever: each
        // retry observes a neighborhood some finished writer left behind.
        let (succ_parent, succ) = loop {
            let mut sp: *mut Node = target;
            let mut s: *mut Node = right;
            loop {
                // SAFETY: s is guard-protected.
                let l: *mut Node = unsafe { (*s).left() };
                if l.is_null() {
                    break;
                }
                sp = s;
                s = l;
            }

            if sp == target {
                // Successor is target.right itself. Its parent is already
                // locked, so it cannot have been unlinked since `right` was
                // read; only its left slot can have gained a node.
                // SAFETY: s is guard-protected.
                unsafe { lm.lock(s) };
                // SAFETY: locked above.
                if unsafe { !(*s).left().is_null() } {
                    trace_log!("successor gained a left child; re-walking");
                    lm.unlock();
                    continue;
                }
                break (sp, s);
            }

            // SAFETY: sp is guard-protected.
            unsafe { lm.lock(sp) };
            // SAFETY: locked above.
            let sp_ok: bool = unsafe { !(*sp).is_marked() && (*sp).left() == s };
            if !sp_ok {
                trace_log!("successor parent went stale; re-walking");
                lm.unlock();
                continue;
            }

            // SAFETY: s is guard-protected.
            unsafe { lm.lock(s) };
            // SAFETY: locked above. With sp's lock held, s cannot be
            // unlinked, but it may have been marked or grown a left child
            // before sp was locked.
            let s_ok: bool = unsafe { !(*s).is_marked() && (*s).left().is_null() };
            if !s_ok {
                trace_log!("successor went stale; re-walking");
                lm.unlock();
                lm.unlock();
                continue;
            }

            break (sp, s);
        };

        // Window complete: parent → target → succ_parent → succ, strictly
        // top-down. Linearize the removal, then rebuild the links with the
        // parent-slot store last.
        // SAFETY: all window nodes are locked (succ_parent == target shares
        // the target lock) and guard-protected.
        unsafe {
            (*target).set_marked();

            if succ_parent == target {
                // succ keeps its own right subtree and inherits the left.
                (*succ).set_child(ChildDir::Left, left);
                (*left).set_parent(succ);
                (*succ).set_parent(parent);
                (*succ).set_height((*target).height());
                (*parent).set_child(dir, succ);

                lm.unlock_all();

                RestartPoints {
                    first: succ,
                    second: None,
                }
            } else {
                // Detach succ from its old slot, then graft it into the
                // target's place, inheriting both subtrees.
                let succ_right: *mut Node = (*succ).right();
                (*succ_parent).set_child(ChildDir::Left, succ_right);
                if !succ_right.is_null() {
                    (*succ_right).set_parent(succ_parent);
                }

                (*succ).set_child(ChildDir::Left, left);
                (*left).set_parent(succ);
                (*succ).set_child(ChildDir::Right, right);
                (*right).set_parent(succ);
                (*succ).set_parent(parent);
                (*succ).set_height((*target).height());
                (*parent).set_child(dir, succ);

                lm.unlock_all();

                RestartPoints {
                    first: succ_parent,
                    second: Some(succ),
                }
            }
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================
