//! Sliding time window feeding the aggregator
//!
//! The window decides *when* things happen; the aggregator decides *how*.
//! Every accepted event is announced on the message bus as an `Insert` and
//! queued by timestamp. Each timer tick emits a `Trigger` once per slide
//! interval and an `Evict` for every queued event older than the window size.

use crate::error::WindowError;
use crate::event::{Event, EventId, SharedEvent};
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Configuration for a sliding time window
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Age after which an event is evicted
    pub size: Duration,
    /// Time between two triggers
    pub slide: Duration,
    /// How often the timer task polls the window
    pub tick: Duration,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: Duration::from_secs(20),
            slide: Duration::from_secs(5),
            tick: Duration::from_millis(10),
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), WindowError> {
        let durations = [("size", self.size), ("slide", self.slide), ("tick", self.tick)];
        for (name, value) in durations {
            if value.is_zero() {
                return Err(WindowError::InvalidConfig(format!("{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}

/// Messages from the window to the aggregator.
#[derive(Debug, Clone)]
pub enum WindowMessage {
    Insert { id: EventId, event: SharedEvent },
    Evict { id: EventId },
    Trigger,
}

impl WindowMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WindowMessage::Insert { .. } => "insert",
            WindowMessage::Evict { .. } => "evict",
            WindowMessage::Trigger => "trigger",
        }
    }
}

/// Timestamp-ordered queue of window events plus the trigger clock.
///
/// Holds no channel; [`SlidingTimeWindow`] wraps it with the bus.
#[derive(Debug)]
pub struct WindowSchedule {
    size: chrono::Duration,
    slide: chrono::Duration,
    // Sequence number keeps equal timestamps in arrival order.
    queue: BinaryHeap<Reverse<(DateTime<Utc>, u64, EventId)>>,
    next_seq: u64,
    last_trigger: DateTime<Utc>,
}

impl WindowSchedule {
    pub fn new(config: &WindowConfig, now: DateTime<Utc>) -> Result<Self, WindowError> {
        config.validate()?;
        let convert = |name: &str, d: Duration| {
            chrono::Duration::from_std(d)
                .map_err(|_| WindowError::InvalidConfig(format!("{} is out of range", name)))
        };
        Ok(Self {
            size: convert("size", config.size)?,
            slide: convert("slide", config.slide)?,
            queue: BinaryHeap::new(),
            next_seq: 0,
            last_trigger: now,
        })
    }

    pub fn push(&mut self, timestamp: DateTime<Utc>, id: EventId) {
        self.queue.push(Reverse((timestamp, self.next_seq, id)));
        self.next_seq += 1;
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Timestamp of the oldest queued event.
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.queue.peek().map(|Reverse((ts, _, _))| *ts)
    }

    /// Messages due at `now`: at most one trigger, then evictions oldest
    /// first up to the first event still inside the window.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<WindowMessage> {
        let mut messages = Vec::new();
        if now - self.last_trigger > self.slide {
            messages.push(WindowMessage::Trigger);
            self.last_trigger = now;
        }
        while let Some(Reverse((ts, _, _))) = self.queue.peek() {
            if now - *ts <= self.size {
                break;
            }
            if let Some(Reverse((_, _, id))) = self.queue.pop() {
                messages.push(WindowMessage::Evict { id });
            }
        }
        messages
    }
}

struct WindowState {
    schedule: WindowSchedule,
    bus: Option<mpsc::Sender<WindowMessage>>,
}

/// Time-based sliding window publishing onto the aggregator's bus.
///
/// Inserts and polls share one lock, and an event is only queued for
/// eviction after its `Insert` has been accepted by the bus, so an `Evict`
/// can never overtake the `Insert` it refers to.
pub struct SlidingTimeWindow {
    config: WindowConfig,
    state: Mutex<WindowState>,
}

impl SlidingTimeWindow {
    pub fn new(
        config: WindowConfig,
        bus: mpsc::Sender<WindowMessage>,
    ) -> Result<Self, WindowError> {
        let schedule = WindowSchedule::new(&config, Utc::now())?;
        Ok(Self {
            config,
            state: Mutex::new(WindowState {
                schedule,
                bus: Some(bus),
            }),
        })
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Accept an event, returning the id it was announced under.
    pub async fn insert(&self, event: Event) -> Result<EventId, WindowError> {
        self.insert_shared(Arc::new(event)).await
    }

    pub async fn insert_shared(&self, event: SharedEvent) -> Result<EventId, WindowError> {
        let mut state = self.state.lock().await;
        let bus = state.bus.clone().ok_or(WindowError::BusClosed)?;

        let id = EventId::new();
        let timestamp = event.timestamp;
        bus.send(WindowMessage::Insert { id, event })
            .await
            .map_err(|_| WindowError::BusClosed)?;
        state.schedule.push(timestamp, id);
        Ok(id)
    }

    /// Emit everything due at `now`; returns how many messages were sent.
    pub async fn poll(&self, now: DateTime<Utc>) -> Result<usize, WindowError> {
        let mut state = self.state.lock().await;
        let bus = state.bus.clone().ok_or(WindowError::BusClosed)?;

        let due = state.schedule.due(now);
        let sent = due.len();
        for message in due {
            debug!("Window emitting {}", message.kind());
            bus.send(message).await.map_err(|_| WindowError::BusClosed)?;
        }
        Ok(sent)
    }

    /// Emit a trigger immediately, outside the slide schedule.
    pub async fn trigger(&self) -> Result<(), WindowError> {
        let state = self.state.lock().await;
        let bus = state.bus.as_ref().ok_or(WindowError::BusClosed)?;
        bus.send(WindowMessage::Trigger)
            .await
            .map_err(|_| WindowError::BusClosed)
    }

    /// Drop the bus sender. Later inserts and polls fail with `BusClosed`.
    pub async fn close(&self) {
        self.state.lock().await.bus = None;
    }

    /// Number of events waiting for eviction.
    pub async fn len(&self) -> usize {
        self.state.lock().await.schedule.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
