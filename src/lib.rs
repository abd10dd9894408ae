//! # cavl
//!
//! A concurrent AVL set over `i64` keys with fine-grained per-node locking.
//!
//! - Lookups are lock-free: a seek descends the tree reading child links as
//!   atomic hints and decides membership from a node's logical-deletion
//!   mark.
//! - Inserts and removals seek lock-free, then lock a small neighborhood
//!   (at most four nodes, acquired strictly top-down), re-validate what the
//!   seek observed, and retry from scratch when a concurrent writer
//!   invalidated it.
//! - After every mutation a rebalancer climbs toward the root with a
//!   sliding window of locks, repairing heights and applying single or
//!   double rotations to restore the AVL balance condition.
//! - Physically unlinked nodes are retired through [`seize`], so readers
//!   still traversing them remain safe without a global lock.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//!
//! use cavl::AvlSet;
//!
//! let set = Arc::new(AvlSet::new());
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|t| {
//!         let set = Arc::clone(&set);
//!         thread::spawn(move || {
//!             for i in 0..100 {
//!                 set.insert(t * 1000 + i);
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for h in handles {
//!     h.join().unwrap();
//! }
//!
//! assert!(set.contains(3099));
//! assert!(!set.contains(4000));
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

mod lock_manager;
mod node;
mod reclaim;
mod tracing_helpers;
mod tree;

pub use tree::AvlSet;
