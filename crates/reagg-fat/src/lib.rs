//! # reagg-fat
//!
//! Flat array-encoded aggregation tree (FlatFAT) for incremental sliding-window
//! aggregation.
//!
//! ## The Problem
//!
//! A sliding window over a stream changes by one event at a time, but naively
//! re-folding every event in the window on each change costs O(n) per query.
//!
//! ## The Solution
//!
//! FlatFAT keeps the partial aggregate of every event as a leaf of a complete
//! binary tree stored in one flat vector, and every inner node holds the
//! combination of its children. Writing or clearing a leaf only touches its
//! O(log n) ancestors, and batches of writes share the ancestors they have in
//! common. The leaves double as a circular buffer: [`FlatFat::aggregate`]
//! answers for a wrapping live range with one prefix and one suffix walk.
//!
//! ## Example
//!
//! ```
//! use reagg_fat::FlatFat;
//!
//! let min = |a: &i64, b: &i64| *a.min(b);
//! let mut tree = FlatFat::with_capacity(4, min).unwrap();
//!
//! tree.update([(0, Some(5)), (1, Some(3)), (2, Some(8)), (3, Some(1))]);
//! assert_eq!(tree.aggregate(0, 0), Some(1));
//!
//! // Evict the minimum; the next query sees the runner-up.
//! tree.update([(3, None)]);
//! assert_eq!(tree.aggregate(0, 3), Some(3));
//!
//! // Grow the buffer; live leaves are packed from position 0.
//! let remap = tree.resize(0, 8).unwrap();
//! assert_eq!(tree.capacity(), 8);
//! assert_eq!(remap.get(2), Some(2));
//! assert_eq!(remap.get(3), None);
//! ```
//!
//! ## Key Operations
//!
//! - [`FlatFat::update()`] - Batched leaf writes with one dirty-set sweep
//! - [`FlatFat::prefix()`], [`FlatFat::suffix()`] - O(log n) partial ranges
//! - [`FlatFat::aggregate()`] - Aggregate over a circular live range
//! - [`FlatFat::resize()`] - Rebuild at a new capacity, returning an [`IndexRemap`]
//! - [`FlatFat::compact()`] - Close holes without changing capacity
//! - [`FlatFat::to_dot()`] - Export to Graphviz for visualization

mod combine;
mod debug;
mod error;
mod iter;
mod node;
mod remap;
mod tree;

pub use combine::{combine_optional, Combine};
pub use error::FatError;
pub use iter::LiveLeaves;
pub use remap::IndexRemap;
pub use tree::FlatFat;
