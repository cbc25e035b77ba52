//! Flat array-encoded aggregation tree
//!
//! `FlatFat` stores a complete binary tree over a power-of-two number of
//! leaves in a single vector of `2 * capacity - 1` slots. Leaves occupy the
//! last `capacity` slots; leaf position `p` lives at storage index
//! `capacity - 1 + p`. Every inner node holds the combination of its two
//! children, with absent children acting as the identity.

use crate::combine::{combine_optional, Combine};
use crate::error::FatError;
use crate::iter::LiveLeaves;
use crate::node::{is_left_child, is_right_child, left, parent, right, ROOT};
use crate::remap::IndexRemap;
use rustc_hash::FxHashSet;
use std::fmt;

/// Flat aggregation tree over a circular buffer of partial aggregates.
///
/// # Example
/// ```
/// use reagg_fat::FlatFat;
///
/// let add = |a: &u64, b: &u64| a + b;
/// let mut tree = FlatFat::with_capacity(4, add).unwrap();
/// tree.update([(0, Some(5)), (1, Some(3)), (3, Some(1))]);
/// assert_eq!(tree.root(), Some(&9));
///
/// // Clearing a leaf removes it from every ancestor.
/// tree.update([(1, None)]);
/// assert_eq!(tree.root(), Some(&6));
/// ```
#[derive(Clone)]
pub struct FlatFat<T, C> {
    data: Vec<Option<T>>,
    combiner: C,
}

impl<T, C> FlatFat<T, C>
where
    T: Clone,
    C: Combine<T>,
{
    /// Build a tree whose leaves are `leaves`, combining bottom-up once.
    ///
    /// The number of leaves becomes the capacity and must be a power of two.
    pub fn new(leaves: Vec<Option<T>>, combiner: C) -> Result<Self, FatError> {
        let capacity = leaves.len();
        let mut tree = Self::with_capacity(capacity, combiner)?;
        tree.update(
            leaves
                .into_iter()
                .enumerate()
                .filter(|(_, leaf)| leaf.is_some()),
        );
        Ok(tree)
    }

    /// Build a tree with `capacity` absent leaves.
    pub fn with_capacity(capacity: usize, combiner: C) -> Result<Self, FatError> {
        if !capacity.is_power_of_two() {
            return Err(FatError::InvalidCapacity(capacity));
        }
        Ok(Self {
            data: vec![None; 2 * capacity - 1],
            combiner,
        })
    }

    /// Number of leaf slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        (self.data.len() + 1) / 2
    }

    #[inline]
    fn leaf_index(&self, position: usize) -> usize {
        let capacity = self.capacity();
        assert!(
            position < capacity,
            "leaf position {} out of range for capacity {}",
            position,
            capacity
        );
        capacity - 1 + position
    }

    /// Write leaves and recompute every affected ancestor once.
    ///
    /// All writes are applied first. The parents of the touched leaves form
    /// the first dirty level; each dirty node is recombined from its
    /// children and its parent joins the next level, until the root has been
    /// processed. Writing `None` clears a leaf. When a position appears more
    /// than once the last write wins.
    ///
    /// # Panics
    /// Panics if a position is not below [`capacity`](Self::capacity).
    pub fn update<I>(&mut self, changes: I)
    where
        I: IntoIterator<Item = (usize, Option<T>)>,
    {
        let mut dirty = FxHashSet::default();
        for (position, value) in changes {
            let index = self.leaf_index(position);
            self.data[index] = value;
            if index != ROOT {
                dirty.insert(parent(index));
            }
        }

        while !dirty.is_empty() {
            let mut next_level = FxHashSet::default();
            for &index in &dirty {
                let combined = self.combine(left(index), right(index));
                self.data[index] = combined;
                if index != ROOT {
                    next_level.insert(parent(index));
                }
            }
            dirty = next_level;
        }
    }

    /// Combine the partials stored at two storage indices.
    pub fn combine(&self, index1: usize, index2: usize) -> Option<T> {
        combine_optional(
            &self.combiner,
            self.data[index1].as_ref(),
            self.data[index2].as_ref(),
        )
    }

    fn combine_values(&self, left: Option<&T>, right: Option<&T>) -> Option<T> {
        combine_optional(&self.combiner, left, right)
    }

    /// Whole-tree aggregate stored at the root.
    #[inline]
    pub fn root(&self) -> Option<&T> {
        self.data[ROOT].as_ref()
    }

    /// Aggregate of leaves `0..=position`.
    ///
    /// Walks from the leaf to the root, folding in the left sibling whenever
    /// the ascent leaves a right child. The sibling is combined before the
    /// accumulator so evaluation stays left to right.
    pub fn prefix(&self, position: usize) -> Option<T> {
        let mut node = self.leaf_index(position);
        let mut agg = self.data[node].clone();
        while node != ROOT {
            let p = parent(node);
            if is_right_child(node) {
                agg = self.combine_values(self.data[left(p)].as_ref(), agg.as_ref());
            }
            node = p;
        }
        agg
    }

    /// Aggregate of leaves `position..capacity`.
    ///
    /// Mirror of [`prefix`](Self::prefix): right siblings are folded in after
    /// the accumulator whenever the ascent leaves a left child.
    pub fn suffix(&self, position: usize) -> Option<T> {
        let mut node = self.leaf_index(position);
        let mut agg = self.data[node].clone();
        while node != ROOT {
            let p = parent(node);
            if is_left_child(node) {
                agg = self.combine_values(agg.as_ref(), self.data[right(p)].as_ref());
            }
            node = p;
        }
        agg
    }

    /// Aggregate of the live circular range `[front, back)`.
    ///
    /// Every leaf outside the range must be absent. When `front < back` the
    /// range does not wrap and the root already is the answer. Otherwise the
    /// range is the tail `front..capacity` followed by the head `0..back`; the
    /// dead middle holds only absent leaves. `front == back` covers both the
    /// empty and the full buffer: the tail and head then partition all leaves
    /// exactly once.
    ///
    /// # Panics
    /// Panics if `front` or `back` is not below the capacity.
    pub fn aggregate(&self, front: usize, back: usize) -> Option<T> {
        self.leaf_index(front);
        self.leaf_index(back);
        if front < back {
            return self.root().cloned();
        }
        let tail = self.suffix(front);
        let head = if back == 0 {
            None
        } else {
            self.prefix(back - 1)
        };
        self.combine_values(tail.as_ref(), head.as_ref())
    }

    /// Rebuild at `new_capacity`, packing live leaves from logical position 0.
    ///
    /// Leaves are scanned circularly starting at `front`; the k-th live leaf
    /// lands at position k of the new tree. The returned remap covers every
    /// old position.
    pub fn resize(&mut self, front: usize, new_capacity: usize) -> Result<IndexRemap, FatError> {
        if !new_capacity.is_power_of_two() {
            return Err(FatError::InvalidCapacity(new_capacity));
        }
        let live = self.live_leaves();
        if live > new_capacity {
            return Err(FatError::CapacityUnderflow {
                requested: new_capacity,
                live,
            });
        }
        // Validates front before the old storage is released.
        self.leaf_index(front);

        let old_capacity = self.capacity();
        let old_data = std::mem::replace(&mut self.data, vec![None; 2 * new_capacity - 1]);
        let old_leaves = &old_data[old_capacity - 1..];

        let mut remap = IndexRemap::unmapped(old_capacity);
        let mut changes = Vec::with_capacity(live);
        for (new_position, (old_position, value)) in
            LiveLeaves::new(old_leaves, front).enumerate()
        {
            remap.assign(old_position, new_position);
            changes.push((new_position, Some(value.clone())));
        }
        self.update(changes);
        Ok(remap)
    }

    /// Close the holes between live leaves without changing capacity.
    ///
    /// Live leaves are packed contiguously starting again at `front`, in
    /// circular order, and every freed trailing slot becomes absent.
    pub fn compact(&mut self, front: usize) -> IndexRemap {
        let capacity = self.capacity();
        self.leaf_index(front);

        let live: Vec<(usize, T)> = self
            .leaves_from(front)
            .map(|(position, value)| (position, value.clone()))
            .collect();
        let live_count = live.len();

        let mut remap = IndexRemap::unmapped(capacity);
        let mut changes = Vec::new();
        for (offset, (old_position, value)) in live.into_iter().enumerate() {
            let new_position = (front + offset) % capacity;
            remap.assign(old_position, new_position);
            if new_position != old_position {
                changes.push((new_position, Some(value)));
            }
        }
        for offset in live_count..capacity {
            let position = (front + offset) % capacity;
            if self.leaf(position).is_some() {
                changes.push((position, None));
            }
        }
        self.update(changes);
        remap
    }

    /// Partial stored at a leaf position, if any.
    pub fn leaf(&self, position: usize) -> Option<&T> {
        let index = self.leaf_index(position);
        self.data[index].as_ref()
    }

    /// All leaf slots in position order.
    pub fn leaves(&self) -> &[Option<T>] {
        &self.data[self.capacity() - 1..]
    }

    /// Partial stored at a raw storage index (inner nodes included).
    pub fn node(&self, index: usize) -> Option<&T> {
        self.data.get(index).and_then(Option::as_ref)
    }

    /// Number of storage slots (`2 * capacity - 1`).
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Number of leaves holding a partial.
    pub fn live_leaves(&self) -> usize {
        self.leaves().iter().filter(|leaf| leaf.is_some()).count()
    }

    /// Live leaves in circular order starting at `front`.
    pub fn leaves_from(&self, front: usize) -> LiveLeaves<'_, T> {
        LiveLeaves::new(self.leaves(), front)
    }

    /// First leaf position whose partial satisfies `predicate`.
    pub fn find_leaf<P>(&self, mut predicate: P) -> Option<usize>
    where
        P: FnMut(&T) -> bool,
    {
        self.leaves()
            .iter()
            .position(|leaf| leaf.as_ref().is_some_and(&mut predicate))
    }
}

impl<T: fmt::Debug, C> fmt::Debug for FlatFat<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let capacity = (self.data.len() + 1) / 2;
        f.debug_struct("FlatFat")
            .field("capacity", &capacity)
            .field("root", &self.data[ROOT])
            .field("leaves", &&self.data[capacity - 1..])
            .finish()
    }
}
