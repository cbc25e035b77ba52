//! Leaf position remapping produced by resize and compaction

/// Mapping from every leaf position before a restructure to its position
/// afterwards.
///
/// The remap is sized by the capacity the tree had *before* the operation.
/// Positions that held no live partial map to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRemap {
    slots: Vec<Option<usize>>,
}

impl IndexRemap {
    /// A remap of `len` old positions, none of them mapped yet.
    pub(crate) fn unmapped(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    #[inline]
    pub(crate) fn assign(&mut self, old_position: usize, new_position: usize) {
        self.slots[old_position] = Some(new_position);
    }

    /// New position of the leaf that lived at `old_position`.
    ///
    /// Returns `None` if the slot held no live partial or lies outside the
    /// old capacity.
    #[inline]
    pub fn get(&self, old_position: usize) -> Option<usize> {
        self.slots.get(old_position).copied().flatten()
    }

    /// Number of old positions covered (the capacity before the operation).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of old positions that carried a live partial.
    pub fn mapped_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Iterate `(old, new)` pairs for every live leaf.
    pub fn mapped(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(old, new)| new.map(|n| (old, n)))
    }

    pub fn as_slice(&self) -> &[Option<usize>] {
        &self.slots
    }
}
