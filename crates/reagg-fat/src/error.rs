//! Error types for tree construction and restructuring

/// Errors raised by [`FlatFat`](crate::FlatFat) construction and resizing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatError {
    #[error("capacity {0} is not a power of two")]
    InvalidCapacity(usize),

    #[error("cannot resize to capacity {requested}: {live} leaves are live")]
    CapacityUnderflow { requested: usize, live: usize },
}
