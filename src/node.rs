//! Storage cell for the concurrent AVL set.
//!
//! A [`Node`] owns a key, an AVL height, three links (`left`, `right`,
//! `parent`), a logical-deletion flag, and an embedded mutex.
//!
//! # Concurrency Model
//!
//! - Child and parent links are `AtomicPtr`s. Seeks read them without any
//!   lock as *hints*; every decision made on such a read is re-validated
//!   after the relevant node lock is held.
//! - `mark` transitions false → true exactly once, under the node's lock.
//!   Readers load it without the lock; that load is the linearization point
//!   of `contains`.
//! - `height` is recomputed under the node's lock but may be read without it
//!   by the rebalancer when choosing rotations; a stale height at worst
//!   causes a redundant rebalance iteration, never an incorrect rotation.
//! - The embedded lock is a [`parking_lot::RawMutex`] rather than a guard
//!   based mutex: the write protocol acquires and releases locks across
//!   scope boundaries as its window slides up the tree, which borrow-scoped
//!   guards cannot express.

use std::cmp::Ordering;
use std::fmt as StdFmt;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicPtr, Ordering as AtomicOrdering};

use parking_lot::lock_api::RawMutex as RawMutexApi;
use parking_lot::RawMutex;

/// Height of a null child.
pub(crate) const NULL_HEIGHT: i32 = -1;

// ============================================================================
//  ChildDir
// ============================================================================

/// Which child slot of a parent a seek descended into.
///
/// Recorded by the seek and validated after locking: the slot named by the
/// direction must still hold the pointer observed during the descent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChildDir {
    Left,
    Right,
}

// ============================================================================
//  Node
// ============================================================================

/// A tree cell: key, AVL height, links, deletion mark, and embedded lock.
///
/// All fields except `key` and `sentinel` are mutated only while `lock` is
/// held; the atomics exist so lock-free seeks can read them as hints.
pub(crate) struct Node {
    /// The key. Immutable after creation. Meaningless for the sentinel.
    key: i64,

    /// True only for the permanent root sentinel, which compares greater
    /// than every real key. Keeps the whole `i64` range admissible.
    sentinel: bool,

    /// AVL height; longest link path to a descendant, null child = -1.
    height: AtomicI32,

    /// Left child, or null.
    left: AtomicPtr<Node>,

    /// Right child, or null.
    right: AtomicPtr<Node>,

    /// Parent back-link used by the rebalancer to climb. Consistent with
    /// whichever of the parent's child slots names this node whenever both
    /// locks are held.
    parent: AtomicPtr<Node>,

    /// Logical-deletion flag: set true exactly once, never cleared.
    mark: AtomicBool,

    /// Per-node mutex.
    lock: RawMutex,
}

impl Node {
    /// Create an unlinked real node with the given key and height 0.
    #[must_use]
    pub(crate) fn new(key: i64) -> Self {
        Self {
            key,
            sentinel: false,
            height: AtomicI32::new(0),
            left: AtomicPtr::new(ptr::null_mut()),
            right: AtomicPtr::new(ptr::null_mut()),
            parent: AtomicPtr::new(ptr::null_mut()),
            mark: AtomicBool::new(false),
            lock: RawMutex::INIT,
        }
    }

    /// Create the permanent root sentinel.
    ///
    /// The sentinel's key compares greater than any real key, its `left`
    /// child is the entire real tree, and its `right` is always null. It is
    /// never marked and never removed.
    #[must_use]
    pub(crate) fn sentinel() -> Self {
        Self {
            key: 0,
            sentinel: true,
            height: AtomicI32::new(0),
            left: AtomicPtr::new(ptr::null_mut()),
            right: AtomicPtr::new(ptr::null_mut()),
            parent: AtomicPtr::new(ptr::null_mut()),
            mark: AtomicBool::new(false),
            lock: RawMutex::INIT,
        }
    }

    /// Allocate `node` on the heap and leak it as a raw pointer.
    ///
    /// The pointer is owned by the tree until it is retired through the
    /// collector or freed by the teardown traversal.
    #[must_use]
    pub(crate) fn into_raw(node: Self) -> *mut Node {
        Box::into_raw(Box::new(node))
    }

    // ========================================================================
    //  Key access
    // ========================================================================

    /// The node's key. Must not be called on the sentinel.
    #[inline]
    #[must_use]
    pub(crate) fn key(&self) -> i64 {
        debug_assert!(!self.sentinel, "sentinel has no key");
        self.key
    }

    /// Whether this node is the root sentinel.
    #[inline]
    #[must_use]
    pub(crate) fn is_sentinel(&self) -> bool {
        self.sentinel
    }

    /// Compare a probe key against this node's key.
    ///
    /// The sentinel compares greater than every probe, so a seek entering at
    /// the sentinel always descends left into the real tree.
    #[inline]
    #[must_use]
    pub(crate) fn cmp_key(&self, probe: i64) -> Ordering {
        if self.sentinel {
            Ordering::Less
        } else {
            probe.cmp(&self.key)
        }
    }

    // ========================================================================
    //  Links
    // ========================================================================

    /// Load a child slot.
    #[inline]
    #[must_use]
    pub(crate) fn child(&self, dir: ChildDir) -> *mut Node {
        match dir {
            ChildDir::Left => self.left.load(AtomicOrdering::Acquire),
            ChildDir::Right => self.right.load(AtomicOrdering::Acquire),
        }
    }

    /// Store a child slot. Caller holds this node's lock.
    #[inline]
    pub(crate) fn set_child(&self, dir: ChildDir, child: *mut Node) {
        match dir {
            ChildDir::Left => self.left.store(child, AtomicOrdering::Release),
            ChildDir::Right => self.right.store(child, AtomicOrdering::Release),
        }
    }

    /// Load the left child.
    #[inline]
    #[must_use]
    pub(crate) fn left(&self) -> *mut Node {
        self.left.load(AtomicOrdering::Acquire)
    }

    /// Load the right child.
    #[inline]
    #[must_use]
    pub(crate) fn right(&self) -> *mut Node {
        self.right.load(AtomicOrdering::Acquire)
    }

    /// Load the parent back-link.
    #[inline]
    #[must_use]
    pub(crate) fn parent(&self) -> *mut Node {
        self.parent.load(AtomicOrdering::Acquire)
    }

    /// Store the parent back-link.
    #[inline]
    pub(crate) fn set_parent(&self, parent: *mut Node) {
        self.parent.store(parent, AtomicOrdering::Release);
    }

    // ========================================================================
    //  Mark
    // ========================================================================

    /// Whether this node has been logically removed.
    #[inline]
    #[must_use]
    pub(crate) fn is_marked(&self) -> bool {
        self.mark.load(AtomicOrdering::Acquire)
    }

    /// Set the logical-deletion flag. Caller holds this node's lock; this is
    /// the linearization point of a removal.
    #[inline]
    pub(crate) fn set_marked(&self) {
        debug_assert!(!self.sentinel, "sentinel is never marked");
        self.mark.store(true, AtomicOrdering::Release);
    }

    // ========================================================================
    //  Height
    // ========================================================================

    /// This node's recorded height.
    #[inline]
    #[must_use]
    pub(crate) fn height(&self) -> i32 {
        self.height.load(AtomicOrdering::Acquire)
    }

    /// Record a recomputed height. Caller holds this node's lock.
    #[inline]
    pub(crate) fn set_height(&self, height: i32) {
        self.height.store(height, AtomicOrdering::Release);
    }

    /// Height of a possibly-null node pointer, null = -1.
    ///
    /// # Safety
    ///
    /// `node` must be null or point to a node kept alive by the caller's
    /// collector guard.
    #[inline]
    #[must_use]
    pub(crate) unsafe fn height_of(node: *const Node) -> i32 {
        if node.is_null() {
            NULL_HEIGHT
        } else {
            // SAFETY: non-null per check; caller's guard keeps it alive.
            unsafe { (*node).height() }
        }
    }

    // ========================================================================
    //  Lock
    // ========================================================================

    /// Acquire this node's lock, blocking.
    #[inline]
    pub(crate) fn lock(&self) {
        self.lock.lock();
    }

    /// Try to acquire this node's lock without blocking.
    #[inline]
    #[must_use]
    pub(crate) fn try_lock(&self) -> bool {
        self.lock.try_lock()
    }

    /// Release this node's lock.
    ///
    /// # Safety
    ///
    /// The current thread must hold the lock (acquired via [`Node::lock`] or
    /// a successful [`Node::try_lock`]).
    #[inline]
    pub(crate) unsafe fn unlock(&self) {
        // SAFETY: caller holds the lock per contract.
        unsafe { self.lock.unlock() };
    }
}

impl StdFmt::Debug for Node {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        let mut d = f.debug_struct("Node");
        if self.sentinel {
            d.field("sentinel", &true);
        } else {
            d.field("key", &self.key);
        }
        d.field("height", &self.height())
            .field("marked", &self.is_marked())
            .finish_non_exhaustive()
    }
}

// ============================================================================
//  Tests
// ============================================================================
