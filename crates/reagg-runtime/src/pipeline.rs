//! Wiring of window, timer and aggregator worker into one running pipeline

use crate::aggregation::Operator;
use crate::aggregator::{AggregatorConfig, ReactiveAggregator};
use crate::error::{AggregatorError, WindowError};
use crate::event::{Event, EventId};
use crate::sink::ResultSink;
use crate::timer::TimerManager;
use crate::window::{SlidingTimeWindow, WindowConfig};
use crate::worker::{spawn_aggregator_worker, WorkerSummary};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Default capacity of the window-to-aggregator bus.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    pub aggregator: AggregatorConfig,
    pub bus_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            aggregator: AggregatorConfig::default(),
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), WindowError> {
        self.window.validate()?;
        self.aggregator.validate()?;
        if self.bus_capacity == 0 {
            return Err(WindowError::InvalidConfig(
                "bus_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A sliding time window feeding a reactive aggregator.
///
/// Owns the timer task and the aggregator worker. Call [`shutdown`] to stop
/// both and collect the worker's summary.
///
/// [`shutdown`]: WindowedAggregation::shutdown
pub struct WindowedAggregation<O: Operator> {
    window: Arc<SlidingTimeWindow>,
    aggregator: Arc<ReactiveAggregator<O>>,
    timers: TimerManager,
    worker: JoinHandle<Result<WorkerSummary, AggregatorError>>,
}

impl<O: Operator> WindowedAggregation<O> {
    /// Build the pipeline and spawn its tasks. Must be called inside a
    /// tokio runtime.
    pub fn start(
        operator: O,
        config: PipelineConfig,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, WindowError> {
        config.validate()?;

        let (size, slide) = (config.window.size, config.window.slide);
        let (bus_tx, bus_rx) = mpsc::channel(config.bus_capacity);
        let aggregator = Arc::new(ReactiveAggregator::new(operator, config.aggregator)?);
        let window = Arc::new(SlidingTimeWindow::new(config.window, bus_tx)?);

        let worker = spawn_aggregator_worker(Arc::clone(&aggregator), bus_rx, sink);
        let mut timers = TimerManager::new();
        timers.spawn_window_timer(Arc::clone(&window));

        info!(
            "Started {} over a {:?} window sliding every {:?}",
            aggregator.operator().name(),
            size,
            slide
        );

        Ok(Self {
            window,
            aggregator,
            timers,
            worker,
        })
    }

    pub async fn insert(&self, event: Event) -> Result<EventId, WindowError> {
        self.window.insert(event).await
    }

    pub fn window(&self) -> &Arc<SlidingTimeWindow> {
        &self.window
    }

    pub fn aggregator(&self) -> &Arc<ReactiveAggregator<O>> {
        &self.aggregator
    }

    /// Stop the timer, close the bus and wait for the worker to drain it.
    pub async fn shutdown(mut self) -> Result<WorkerSummary, WindowError> {
        self.timers.shutdown().await;
        self.window.close().await;
        let summary = (&mut self.worker).await??;
        info!(
            "Stopped {}: {} inserts, {} evictions, {} triggers",
            self.aggregator.operator().name(),
            summary.inserts,
            summary.evictions,
            summary.triggers
        );
        Ok(summary)
    }
}
