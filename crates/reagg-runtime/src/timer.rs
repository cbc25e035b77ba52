//! Timer module driving sliding windows
//!
//! Each window gets one task that wakes every `tick` and lets the window
//! emit whatever triggers and evictions are due.

use crate::window::SlidingTimeWindow;
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Spawn a timer task that polls `window` every configured tick.
///
/// The task ends on its own once the window's bus is closed, or when the
/// returned handle is aborted.
pub fn spawn_window_timer(window: Arc<SlidingTimeWindow>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let tick = window.config().tick;
        debug!("Window timer starting with tick: {:?}", tick);

        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick
        interval.tick().await;

        loop {
            interval.tick().await;
            match window.poll(Utc::now()).await {
                Ok(0) => {}
                Ok(sent) => debug!("Window timer fired: {} messages", sent),
                Err(e) => {
                    debug!("Window timer stopping: {}", e);
                    break;
                }
            }
        }
    })
}

/// Timer manager that tracks spawned timer tasks
pub struct TimerManager {
    handles: Vec<JoinHandle<()>>,
}

impl TimerManager {
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Spawn and track a timer for `window`.
    pub fn spawn_window_timer(&mut self, window: Arc<SlidingTimeWindow>) {
        self.handles.push(spawn_window_timer(window));
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop all timer tasks
    pub fn stop_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    /// Abort all timer tasks and wait until they are gone.
    pub async fn shutdown(&mut self) {
        let handles: Vec<_> = self.handles.drain(..).collect();
        for handle in &handles {
            handle.abort();
        }
        for handle in handles {
            // Cancellation is the expected outcome.
            let _ = handle.await;
        }
    }
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TimerManager {
    fn drop(&mut self) {
        self.stop_all();
    }
}
