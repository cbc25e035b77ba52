//! Circular iteration over live leaves
//!
//! Resize and compaction both walk the leaf buffer once, starting at the
//! logical front and wrapping around, collecting every present partial in
//! circular order. [`LiveLeaves`] is that walk.

use std::iter::FusedIterator;

/// Iterator over `(position, partial)` for every present leaf, visiting
/// positions `front, front+1, …, capacity-1, 0, …, front-1`.
pub struct LiveLeaves<'a, T> {
    leaves: &'a [Option<T>],
    front: usize,
    offset: usize,
}

impl<'a, T> LiveLeaves<'a, T> {
    pub(crate) fn new(leaves: &'a [Option<T>], front: usize) -> Self {
        Self {
            leaves,
            front,
            offset: 0,
        }
    }
}

impl<'a, T> Iterator for LiveLeaves<'a, T> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.leaves.len();
        while self.offset < len {
            let position = (self.front + self.offset) % len;
            self.offset += 1;
            if let Some(value) = &self.leaves[position] {
                return Some((position, value));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.leaves.len() - self.offset))
    }
}

impl<T> FusedIterator for LiveLeaves<'_, T> {}
