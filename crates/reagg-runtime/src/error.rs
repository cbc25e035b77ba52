//! Error types for the aggregator and the window

use crate::event::EventId;
use reagg_fat::FatError;

/// Classification of aggregator failures.
///
/// None of these are transient: the aggregator performs no I/O, so every
/// error is a contract breach by the caller or a bug in the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller referenced an event id the aggregator does not hold, or
    /// reused a live one.
    ProtocolViolation,
    /// Internal bookkeeping disagrees with the tree.
    InvariantViolation,
    /// A shrink was requested below the number of live leaves.
    CapacityUnderflow,
    /// The aggregator was constructed with unusable settings.
    Configuration,
}

/// Errors raised by [`ReactiveAggregator`](crate::aggregator::ReactiveAggregator).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregatorError {
    #[error("evict for unknown event {0}: never inserted or already evicted")]
    UnknownEvent(EventId),

    #[error("insert for event {0} which is already in the window")]
    DuplicateEvent(EventId),

    #[error("event {id} has no leaf after {operation}")]
    LostLeaf { id: EventId, operation: &'static str },

    #[error("event {id} is indexed at leaf {position} which holds no partial")]
    DanglingIndex { id: EventId, position: usize },

    #[error("aggregator counts {counted} tuples but {live} leaves are live")]
    CountMismatch { counted: usize, live: usize },

    #[error("aggregator counts {counted} tuples but indexes {indexed} events")]
    IndexMismatch { counted: usize, indexed: usize },

    #[error("live leaf {position} lies outside the buffer range [{front}, {back})")]
    LeafOutsideRange {
        position: usize,
        front: usize,
        back: usize,
    },

    #[error("invalid aggregator configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Tree(#[from] FatError),
}

impl AggregatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AggregatorError::UnknownEvent(_) | AggregatorError::DuplicateEvent(_) => {
                ErrorKind::ProtocolViolation
            }
            AggregatorError::LostLeaf { .. }
            | AggregatorError::DanglingIndex { .. }
            | AggregatorError::CountMismatch { .. }
            | AggregatorError::IndexMismatch { .. }
            | AggregatorError::LeafOutsideRange { .. } => ErrorKind::InvariantViolation,
            AggregatorError::InvalidConfig(_) => ErrorKind::Configuration,
            AggregatorError::Tree(FatError::CapacityUnderflow { .. }) => {
                ErrorKind::CapacityUnderflow
            }
            AggregatorError::Tree(FatError::InvalidCapacity(_)) => ErrorKind::InvariantViolation,
        }
    }

    /// Whether the error leaves the aggregator unusable.
    ///
    /// Protocol violations are rejected before any state changes; everything
    /// else means the bookkeeping can no longer be trusted.
    pub fn is_fatal(&self) -> bool {
        self.kind() != ErrorKind::ProtocolViolation
    }
}

/// Errors raised by the sliding window and the pipeline around it.
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    #[error("window message bus is closed")]
    BusClosed,

    #[error("invalid window configuration: {0}")]
    InvalidConfig(String),

    #[error("aggregator failed: {0}")]
    Aggregator(#[from] AggregatorError),

    #[error("aggregator worker panicked or was cancelled: {0}")]
    WorkerJoin(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let id = EventId::from_u128(7);
        assert_eq!(
            AggregatorError::UnknownEvent(id).kind(),
            ErrorKind::ProtocolViolation
        );
        assert_eq!(
            AggregatorError::DuplicateEvent(id).kind(),
            ErrorKind::ProtocolViolation
        );
        assert_eq!(
            AggregatorError::LostLeaf {
                id,
                operation: "compact"
            }
            .kind(),
            ErrorKind::InvariantViolation
        );
        assert_eq!(
            AggregatorError::from(FatError::CapacityUnderflow {
                requested: 2,
                live: 3
            })
            .kind(),
            ErrorKind::CapacityUnderflow
        );
        assert_eq!(
            AggregatorError::InvalidConfig("x".into()).kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn test_fatal_classification() {
        let id = EventId::from_u128(1);
        assert!(!AggregatorError::UnknownEvent(id).is_fatal());
        assert!(AggregatorError::CountMismatch {
            counted: 2,
            live: 1
        }
        .is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = AggregatorError::LeafOutsideRange {
            position: 5,
            front: 0,
            back: 3,
        };
        assert_eq!(
            err.to_string(),
            "live leaf 5 lies outside the buffer range [0, 3)"
        );
        let err: AggregatorError = FatError::InvalidCapacity(6).into();
        assert_eq!(err.to_string(), "capacity 6 is not a power of two");
    }
}
