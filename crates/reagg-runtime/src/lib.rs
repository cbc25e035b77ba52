//! Reagg Runtime - Reactive sliding-window aggregation
//!
//! This crate connects a time-based sliding window to a [`ReactiveAggregator`]
//! backed by a flat aggregation tree. The window announces inserts,
//! evictions and triggers on a message bus; the aggregator keeps one partial
//! per live event and answers every trigger in logarithmic time.
//!
//! ```no_run
//! use reagg_runtime::{Avg, ConsoleSink, Event, PipelineConfig, WindowedAggregation};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), reagg_runtime::WindowError> {
//! let sink = Arc::new(ConsoleSink::new("stdout"));
//! let pipeline = WindowedAggregation::start(Avg::new("value"), PipelineConfig::default(), sink)?;
//! pipeline.insert(Event::new("Reading").with_field("value", 4.2)).await?;
//! let summary = pipeline.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod aggregator;
pub mod error;
pub mod event;
pub mod pipeline;
pub mod simulator;
pub mod sink;
pub mod timer;
pub mod window;
pub mod worker;

pub use aggregation::{ArgMax, Avg, Count, Max, Min, Operator, OperatorKind, Sum};
pub use aggregator::{AggregatorConfig, AggregatorStats, ReactiveAggregator};
pub use error::{AggregatorError, ErrorKind, WindowError};
pub use event::{Event, EventId, SharedEvent};
pub use pipeline::{PipelineConfig, WindowedAggregation};
pub use simulator::{EventGenerator, GeneratorConfig, GeneratorMode};
pub use sink::{ChannelSink, ConsoleSink, FileSink, MultiSink, ResultSink, WindowResult};
pub use timer::{spawn_window_timer, TimerManager};
pub use window::{SlidingTimeWindow, WindowConfig, WindowMessage, WindowSchedule};
pub use worker::{apply_message, spawn_aggregator_worker, WorkerSummary};
