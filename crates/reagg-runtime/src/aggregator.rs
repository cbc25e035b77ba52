//! Reactive aggregator: maps window insert/evict/trigger onto a FlatFat
//!
//! The tree's leaves are used as a circular buffer. Inserts append at
//! `back`, evictions clear an arbitrary leaf (advancing `front` when the
//! oldest slot is cleared), and triggers read the aggregate of the live range
//! `[front, back)`. Leaf writes are queued and applied in one batch right
//! before the tree is read or restructured.
//!
//! When an insert finds the ring full, holes left by out-of-order evictions
//! are squeezed out with `compact` if that frees at least a quarter of the
//! buffer; otherwise the capacity doubles. Evictions halve the capacity once
//! fewer than a quarter of the slots are live.

use crate::aggregation::Operator;
use crate::error::AggregatorError;
use crate::event::{Event, EventId};
use crate::sink::WindowResult;
use chrono::Utc;
use reagg_fat::{Combine, FlatFat, IndexRemap};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Number of leaf slots the aggregator starts with.
pub const INITIAL_CAPACITY: usize = 4;

/// Configuration for a reactive aggregator
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Leaf slots allocated up front; must be a power of two
    pub initial_capacity: usize,
    /// Evictions never shrink the buffer below this; must be a power of two
    pub min_capacity: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            initial_capacity: INITIAL_CAPACITY,
            min_capacity: 1,
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), AggregatorError> {
        if !self.initial_capacity.is_power_of_two() {
            return Err(AggregatorError::InvalidConfig(format!(
                "initial_capacity {} is not a power of two",
                self.initial_capacity
            )));
        }
        if !self.min_capacity.is_power_of_two() {
            return Err(AggregatorError::InvalidConfig(format!(
                "min_capacity {} is not a power of two",
                self.min_capacity
            )));
        }
        if self.min_capacity > self.initial_capacity {
            return Err(AggregatorError::InvalidConfig(format!(
                "min_capacity {} exceeds initial_capacity {}",
                self.min_capacity, self.initial_capacity
            )));
        }
        Ok(())
    }
}

/// Snapshot of the buffer bookkeeping and lifetime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    pub capacity: usize,
    pub num_tuples: usize,
    pub buffer_front: usize,
    pub buffer_back: usize,
    pub pending_writes: usize,
    pub inserts: u64,
    pub evictions: u64,
    pub triggers: u64,
    pub resizes: u64,
    pub compactions: u64,
    pub shrinks: u64,
}

/// Adapts an [`Operator`] to the tree's [`Combine`] seam.
pub struct OperatorCombiner<O>(Arc<O>);

impl<O: Operator> Combine<O::Partial> for OperatorCombiner<O> {
    #[inline]
    fn combine(&self, left: &O::Partial, right: &O::Partial) -> O::Partial {
        self.0.combine(left, right)
    }
}

type Tree<O> = FlatFat<<O as Operator>::Partial, OperatorCombiner<O>>;

/// Everything guarded by the aggregator's lock.
struct BufferState<O: Operator> {
    tree: Tree<O>,
    front: usize,
    back: usize,
    num_tuples: usize,
    pending_writes: Vec<(usize, Option<O::Partial>)>,
    event_index: FxHashMap<EventId, usize>,
    stats: AggregatorStats,
}

impl<O: Operator> BufferState<O> {
    fn new(tree: Tree<O>) -> Self {
        Self {
            tree,
            front: 0,
            back: 0,
            num_tuples: 0,
            pending_writes: Vec::new(),
            event_index: FxHashMap::default(),
            stats: AggregatorStats::default(),
        }
    }

    fn flush(&mut self) {
        if !self.pending_writes.is_empty() {
            let writes = std::mem::take(&mut self.pending_writes);
            self.tree.update(writes);
        }
    }

    fn is_full(&self) -> bool {
        self.num_tuples > 0 && self.front == self.back
    }

    fn insert(&mut self, id: EventId, partial: O::Partial) -> Result<(), AggregatorError> {
        if self.event_index.contains_key(&id) {
            return Err(AggregatorError::DuplicateEvent(id));
        }
        if self.is_full() {
            self.make_room()?;
        }

        let position = self.back;
        self.pending_writes.push((position, Some(partial)));
        self.event_index.insert(id, position);
        self.back = (position + 1) % self.tree.capacity();
        self.num_tuples += 1;
        self.stats.inserts += 1;
        Ok(())
    }

    /// Compact or grow a full ring so the next insert has a free slot.
    fn make_room(&mut self) -> Result<(), AggregatorError> {
        self.flush();
        let capacity = self.tree.capacity();

        if self.num_tuples <= capacity * 3 / 4 {
            let remap = self.tree.compact(self.front);
            self.remap_index(&remap, "compact")?;
            self.stats.compactions += 1;
            debug!(
                "Compacted full buffer: {} live of {} slots",
                self.num_tuples, capacity
            );
        } else {
            let remap = self.tree.resize(self.front, capacity * 2)?;
            self.front = 0;
            self.remap_index(&remap, "resize")?;
            self.stats.resizes += 1;
            debug!(
                "Grew buffer from {} to {} slots",
                capacity,
                self.tree.capacity()
            );
        }
        self.back = (self.front + self.num_tuples) % self.tree.capacity();
        self.verify()
    }

    fn evict(&mut self, id: EventId, min_capacity: usize) -> Result<(), AggregatorError> {
        if !self.event_index.contains_key(&id) {
            return Err(AggregatorError::UnknownEvent(id));
        }
        self.maybe_shrink(min_capacity)?;

        let position = self
            .event_index
            .remove(&id)
            .ok_or(AggregatorError::UnknownEvent(id))?;
        self.pending_writes.push((position, None));
        if position == self.front {
            self.front = (self.front + 1) % self.tree.capacity();
        }
        self.num_tuples -= 1;
        self.stats.evictions += 1;
        Ok(())
    }

    /// Halve the capacity once fewer than a quarter of the slots are live.
    fn maybe_shrink(&mut self, min_capacity: usize) -> Result<(), AggregatorError> {
        let capacity = self.tree.capacity();
        let target = capacity / 2;
        if self.num_tuples >= capacity / 4 || target < min_capacity {
            return Ok(());
        }

        self.flush();
        let remap = self.tree.resize(self.front, target)?;
        self.front = 0;
        self.back = self.num_tuples % target;
        self.remap_index(&remap, "shrink")?;
        self.stats.shrinks += 1;
        debug!(
            "Shrank buffer from {} to {} slots ({} live)",
            capacity, target, self.num_tuples
        );
        self.verify()
    }

    fn remap_index(
        &mut self,
        remap: &IndexRemap,
        operation: &'static str,
    ) -> Result<(), AggregatorError> {
        for (id, position) in self.event_index.iter_mut() {
            *position = remap.get(*position).ok_or(AggregatorError::LostLeaf {
                id: *id,
                operation,
            })?;
        }
        Ok(())
    }

    /// Number of slots covered by the live range `[front, back)`.
    fn span(&self) -> usize {
        let capacity = self.tree.capacity();
        if self.front == self.back {
            if self.num_tuples > 0 {
                capacity
            } else {
                0
            }
        } else {
            (self.back + capacity - self.front) % capacity
        }
    }

    fn verify(&mut self) -> Result<(), AggregatorError> {
        self.flush();
        let capacity = self.tree.capacity();

        let live = self.tree.live_leaves();
        if live != self.num_tuples {
            return Err(AggregatorError::CountMismatch {
                counted: self.num_tuples,
                live,
            });
        }
        if self.event_index.len() != self.num_tuples {
            return Err(AggregatorError::IndexMismatch {
                counted: self.num_tuples,
                indexed: self.event_index.len(),
            });
        }
        for (&id, &position) in &self.event_index {
            if position >= capacity || self.tree.leaf(position).is_none() {
                return Err(AggregatorError::DanglingIndex { id, position });
            }
        }

        let span = self.span();
        for (position, _) in self.tree.leaves_from(0) {
            if (position + capacity - self.front) % capacity >= span {
                return Err(AggregatorError::LeafOutsideRange {
                    position,
                    front: self.front,
                    back: self.back,
                });
            }
        }
        Ok(())
    }

    fn snapshot(&self) -> AggregatorStats {
        AggregatorStats {
            capacity: self.tree.capacity(),
            num_tuples: self.num_tuples,
            buffer_front: self.front,
            buffer_back: self.back,
            pending_writes: self.pending_writes.len(),
            ..self.stats
        }
    }
}

/// Incremental sliding-window aggregator over a FlatFat.
///
/// All three handlers take the same lock for their whole duration, so they
/// can be called from any number of tasks or threads and are applied in the
/// order they acquire it.
///
/// # Example
/// ```
/// use reagg_core::Value;
/// use reagg_runtime::aggregation::Count;
/// use reagg_runtime::aggregator::{AggregatorConfig, ReactiveAggregator};
/// use reagg_runtime::{Event, EventId};
///
/// let aggregator = ReactiveAggregator::new(Count, AggregatorConfig::default()).unwrap();
/// let first = EventId::new();
/// aggregator.on_insert(&Event::new("Tick"), first).unwrap();
/// aggregator.on_insert(&Event::new("Tick"), EventId::new()).unwrap();
/// aggregator.on_evict(first).unwrap();
///
/// let result = aggregator.on_trigger().unwrap();
/// assert_eq!(result.operator, "COUNT");
/// assert_eq!(result.value, Value::Int(1));
/// ```
pub struct ReactiveAggregator<O: Operator> {
    operator: Arc<O>,
    config: AggregatorConfig,
    state: Mutex<BufferState<O>>,
}

impl<O: Operator> ReactiveAggregator<O> {
    pub fn new(operator: O, config: AggregatorConfig) -> Result<Self, AggregatorError> {
        config.validate()?;
        let operator = Arc::new(operator);
        let tree = FlatFat::with_capacity(
            config.initial_capacity,
            OperatorCombiner(Arc::clone(&operator)),
        )?;
        Ok(Self {
            operator,
            config,
            state: Mutex::new(BufferState::new(tree)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BufferState<O>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Append an event at the back of the buffer.
    ///
    /// A duplicate `id` is rejected before anything changes.
    pub fn on_insert(&self, event: &Event, id: EventId) -> Result<(), AggregatorError> {
        let partial = self.operator.lift(event);
        self.lock().insert(id, partial)
    }

    /// Remove the event inserted under `id`.
    ///
    /// Unknown ids are rejected before any restructuring.
    pub fn on_evict(&self, id: EventId) -> Result<(), AggregatorError> {
        self.lock().evict(id, self.config.min_capacity)
    }

    /// Aggregate over every live event.
    pub fn on_trigger(&self) -> Result<WindowResult, AggregatorError> {
        let mut state = self.lock();
        state.flush();
        state.stats.triggers += 1;

        let value = match state.tree.aggregate(state.front, state.back) {
            Some(partial) => self.operator.lower(&partial),
            None => self.operator.empty_value(),
        };
        Ok(WindowResult {
            operator: self.operator.name().to_string(),
            value,
            produced_at: Utc::now(),
            live_events: state.num_tuples,
        })
    }

    /// Apply queued leaf writes to the tree.
    pub fn flush(&self) {
        self.lock().flush();
    }

    /// Check that the bookkeeping agrees with the tree.
    ///
    /// Flushes first, then verifies the live-leaf count, that every indexed
    /// event points at a present leaf, and that no present leaf lies outside
    /// the live range.
    pub fn check_invariants(&self) -> Result<(), AggregatorError> {
        self.lock().verify()
    }

    /// Current leaf position of a live event.
    pub fn position_of(&self, id: EventId) -> Option<usize> {
        self.lock().event_index.get(&id).copied()
    }

    pub fn stats(&self) -> AggregatorStats {
        self.lock().snapshot()
    }

    /// Number of live events.
    pub fn len(&self) -> usize {
        self.lock().num_tuples
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().tree.capacity()
    }

    /// Graphviz rendering of the tree after flushing pending writes.
    pub fn to_dot(&self) -> String {
        let mut state = self.lock();
        state.flush();
        state.tree.to_dot()
    }
}
