//! LIFO bookkeeping for the node locks an operation currently holds.
//!
//! The seek-validate-mutate phase of insert and remove acquires up to four
//! node locks and must drop every one of them on every exit path, including
//! panics. [`LockManager`] records acquisitions on a stack and releases the
//! remainder in LIFO order when dropped, so an unwinding operation never
//! strands a locked node.
//!
//! The rebalancer does not use this type: its sliding window releases and
//! re-acquires locks in orders that are cheaper to express directly.

use crate::node::Node;

/// Stack of nodes whose locks the current operation holds.
///
/// Every operation must exit with an empty stack; [`Drop`] enforces this by
/// releasing whatever is left.
pub(crate) struct LockManager {
    held: Vec<*mut Node>,
}

impl LockManager {
    /// An empty manager. Operations hold at most four locks at a time.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            held: Vec::with_capacity(4),
        }
    }

    /// Acquire `node`'s lock, blocking, and record it.
    ///
    /// # Safety
    ///
    /// `node` must point to a node kept alive for the duration of the hold
    /// (by the caller's collector guard or by tree ownership).
    pub(crate) unsafe fn lock(&mut self, node: *mut Node) {
        // SAFETY: caller guarantees node is alive.
        unsafe { (*node).lock() };
        self.held.push(node);
    }

    /// Try to acquire `node`'s lock; record it on success.
    ///
    /// # Safety
    ///
    /// Same contract as [`LockManager::lock`].
    #[allow(dead_code)]
    #[must_use]
    pub(crate) unsafe fn try_lock(&mut self, node: *mut Node) -> bool {
        // SAFETY: caller guarantees node is alive.
        let acquired: bool = unsafe { (*node).try_lock() };
        if acquired {
            self.held.push(node);
        }
        acquired
    }

    /// Release the most recently acquired lock.
    ///
    /// # Panics
    ///
    /// Panics if no lock is held; popping an empty stack is a protocol bug.
    pub(crate) fn unlock(&mut self) {
        let node: *mut Node = self.held.pop().expect("unlock with no lock held");
        // SAFETY: node was locked by us in lock/try_lock and not yet released;
        // it stayed alive because its lock was held.
        unsafe { (*node).unlock() };
    }

    /// Release every held lock in LIFO order.
    pub(crate) fn unlock_all(&mut self) {
        while !self.held.is_empty() {
            self.unlock();
        }
    }

    /// Number of locks currently held.
    #[cfg(test)]
    #[must_use]
    pub(crate) fn held(&self) -> usize {
        self.held.len()
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        // Release on all exit paths, including unwinding.
        self.unlock_all();
    }
}

// ============================================================================
//  Tests
// ============================================================================
