//! Validated insert.
//!
//! An insert seeks the key's position lock-free, locks the prospective
//! parent, and re-validates the seek's snapshot before publishing: the
//! parent must still be unmarked and the chosen child slot must still be the
//! null observed during the seek. A failed validation releases the lock and
//! retries from a fresh seek; the retry always restarts at the root
//! sentinel, the highest unmarked ancestor whose subtree is guaranteed to
//! still bound the key.
//!
//! The store that publishes the new node into its parent's child slot is the
//! operation's linearization point.

use std::hint;

use seize::LocalGuard;

use crate::lock_manager::LockManager;
use crate::node::Node;
use crate::tracing_helpers::trace_log;

use super::seek::SeekOutcome;
use super::AvlSet;

impl AvlSet {
    /// Insert `key` using an explicit guard.
    ///
    /// Returns true iff the key was absent and this call published it.
    /// Present keys return false without allocating.
    pub fn insert_with_guard(&self, key: i64, guard: &LocalGuard<'_>) -> bool {
        loop {
            // SAFETY: guard is the collector guard required by seek.
            let outcome: SeekOutcome = unsafe { self.seek(key) };

            match outcome {
                SeekOutcome::Found { node, .. } => {
                    // SAFETY: node is protected by the caller's guard.
                    if !unsafe { (*node).is_marked() } {
                        return false;
                    }

                    // A marked twin is mid-removal and still linked; it will
                    // be unlinked by the remover, which holds the locks we
                    // would need. Spin out of its way and seek again.
                    trace_log!(key, "insert raced a removal of the same key; retrying");
                    hint::spin_loop();
                }

                SeekOutcome::Slot { node: prospective, dir } => {
                    let mut lm = LockManager::new();
                    // SAFETY: prospective is protected by the caller's guard.
                    unsafe { lm.lock(prospective) };

                    // SAFETY: protected by the guard; locked above.
                    let p: &Node = unsafe { &*prospective };

                    // Validate the seek's snapshot under the lock: parent
                    // still unmarked, slot still the same null we observed.
                    // The seek already vetted the slot's interval bounds;
                    // any later mutation that could move the key's interval
                    // away from this slot either fills the slot or marks
                    // the parent, so these two checks re-establish the
                    // interval condition.
                    if p.is_marked() || !p.child(dir).is_null() {
                        trace_log!(key, "insert validation failed; retrying seek");
                        lm.unlock_all();
                        continue;
                    }

                    debug_assert!(
                        !p.is_marked() && p.child(dir).is_null(),
                        "insert slot invariant must hold at publish time"
                    );

                    let fresh: *mut Node = Node::into_raw(Node::new(key));
                    // SAFETY: fresh was just allocated and is still private.
                    unsafe { (*fresh).set_parent(prospective) };

                    // Publish: the new node becomes reachable here.
                    p.set_child(dir, fresh);
                    lm.unlock_all();

                    self.rebalance(fresh, guard);
                    return true;
                }
            }
        }
    }
}

// ============================================================================
//  Tests
// ============================================================================
