//! Aggregator worker: drains the window bus into the aggregator

use crate::aggregation::Operator;
use crate::aggregator::ReactiveAggregator;
use crate::error::AggregatorError;
use crate::sink::{ResultSink, WindowResult};
use crate::window::WindowMessage;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Messages handled by a worker over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerSummary {
    pub inserts: u64,
    pub evictions: u64,
    pub triggers: u64,
}

/// Apply one bus message to the aggregator.
///
/// Returns the window result for a trigger, `None` otherwise.
pub fn apply_message<O: Operator>(
    aggregator: &ReactiveAggregator<O>,
    message: WindowMessage,
) -> Result<Option<WindowResult>, AggregatorError> {
    match message {
        WindowMessage::Insert { id, event } => {
            aggregator.on_insert(&event, id)?;
            Ok(None)
        }
        WindowMessage::Evict { id } => {
            aggregator.on_evict(id)?;
            Ok(None)
        }
        WindowMessage::Trigger => aggregator.on_trigger().map(Some),
    }
}

/// Spawn the task that feeds `rx` into `aggregator` and results into `sink`.
///
/// The task runs until every sender of the bus is dropped. An aggregator
/// error is logged and ends the task; it is returned through the handle.
/// Sink failures are logged and do not stop the worker.
pub fn spawn_aggregator_worker<O: Operator>(
    aggregator: Arc<ReactiveAggregator<O>>,
    mut rx: mpsc::Receiver<WindowMessage>,
    sink: Arc<dyn ResultSink>,
) -> JoinHandle<Result<WorkerSummary, AggregatorError>> {
    tokio::spawn(async move {
        let mut summary = WorkerSummary::default();

        while let Some(message) = rx.recv().await {
            match &message {
                WindowMessage::Insert { .. } => summary.inserts += 1,
                WindowMessage::Evict { .. } => summary.evictions += 1,
                WindowMessage::Trigger => summary.triggers += 1,
            }

            match apply_message(aggregator.as_ref(), message) {
                Ok(Some(result)) => {
                    if let Err(e) = sink.send(&result).await {
                        error!("Sink {} error: {}", sink.name(), e);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!(
                        "Aggregator {} failed ({:?}): {}",
                        aggregator.operator().name(),
                        e.kind(),
                        e
                    );
                    return Err(e);
                }
            }
        }

        if let Err(e) = sink.flush().await {
            error!("Sink {} flush error: {}", sink.name(), e);
        }
        debug!(
            "Aggregator worker stopping: {} inserts, {} evictions, {} triggers",
            summary.inserts, summary.evictions, summary.triggers
        );
        Ok(summary)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Count;
    use crate::aggregator::AggregatorConfig;
    use crate::event::{Event, EventId};
    use crate::sink::ChannelSink;
    use reagg_core::Value;

    fn count_aggregator() -> Arc<ReactiveAggregator<Count>> {
        Arc::new(ReactiveAggregator::new(Count, AggregatorConfig::default()).unwrap())
    }

    #[test]
    fn test_apply_message() {
        let agg = ReactiveAggregator::new(Count, AggregatorConfig::default()).unwrap();
        assert_eq!(apply_message(&agg, insert(1)).unwrap(), None);
        assert_eq!(apply_message(&agg, insert(2)).unwrap(), None);
        apply_message(
            &agg,
            WindowMessage::Evict {
                id: EventId::from_u128(1),
            },
        )
        .unwrap();
        let result = apply_message(&agg, WindowMessage::Trigger).unwrap().unwrap();
        assert_eq!(result.value, Value::Int(1));
    }

    fn insert(id: u128) -> WindowMessage {
        WindowMessage::Insert {
            id: EventId::from_u128(id),
            event: Arc::new(Event::new("Reading")),
        }
    }

    #[tokio::test]
    async fn test_worker_forwards_results() {
        let agg = count_aggregator();
        let (bus_tx, bus_rx) = mpsc::channel(16);
        let (sink, mut results) = ChannelSink::channel("results", 16);
        let worker = spawn_aggregator_worker(Arc::clone(&agg), bus_rx, Arc::new(sink));

        for id in 1..=3 {
            bus_tx.send(insert(id)).await.unwrap();
        }
        bus_tx.send(WindowMessage::Trigger).await.unwrap();
        assert_eq!(results.recv().await.unwrap().value, Value::Int(3));

        drop(bus_tx);
        let summary = worker.await.unwrap().unwrap();
        assert_eq!(
            summary,
            WorkerSummary {
                inserts: 3,
                evictions: 0,
                triggers: 1
            }
        );
    }

    #[tokio::test]
    async fn test_worker_stops_on_protocol_violation() {
        let agg = count_aggregator();
        let (bus_tx, bus_rx) = mpsc::channel(16);
        let (sink, _results) = ChannelSink::channel("results", 16);
        let worker = spawn_aggregator_worker(agg, bus_rx, Arc::new(sink));

        let unknown = EventId::from_u128(42);
        bus_tx.send(WindowMessage::Evict { id: unknown }).await.unwrap();

        let err = worker.await.unwrap().unwrap_err();
        assert_eq!(err, AggregatorError::UnknownEvent(unknown));
        // The receiver is gone with the worker.
        assert!(bus_tx.send(WindowMessage::Trigger).await.is_err());
    }

    #[tokio::test]
    async fn test_worker_survives_sink_failure() {
        let agg = count_aggregator();
        let (bus_tx, bus_rx) = mpsc::channel(16);
        let (sink, results) = ChannelSink::channel("dead", 1);
        drop(results);
        let worker = spawn_aggregator_worker(agg, bus_rx, Arc::new(sink));

        bus_tx.send(insert(1)).await.unwrap();
        bus_tx.send(WindowMessage::Trigger).await.unwrap();
        drop(bus_tx);

        let summary = worker.await.unwrap().unwrap();
        assert_eq!(summary.triggers, 1);
        assert_eq!(summary.inserts, 1);
    }
}
