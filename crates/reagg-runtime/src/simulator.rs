//! Synthetic event stream for demos and load tests

use crate::event::Event;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

/// Shape of the generated stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorMode {
    /// Independent random values stamped with the current time
    #[default]
    Random,
    /// Monotonically increasing values stamped up to half a second ahead
    Incremental,
}

impl fmt::Display for GeneratorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorMode::Random => f.write_str("random"),
            GeneratorMode::Incremental => f.write_str("incremental"),
        }
    }
}

impl FromStr for GeneratorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(GeneratorMode::Random),
            "incremental" => Ok(GeneratorMode::Incremental),
            other => Err(format!(
                "unknown generator mode '{}' (expected random or incremental)",
                other
            )),
        }
    }
}

/// Configuration for the event generator
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub event_type: String,
    pub events_per_second: u32,
    pub mode: GeneratorMode,
    /// Fixed seed for reproducible streams; random when unset
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            event_type: "StreamEvent".to_string(),
            events_per_second: 10_000,
            mode: GeneratorMode::Random,
            seed: None,
        }
    }
}

/// Upper bound on how far ahead incremental events are stamped.
const MAX_JITTER_MS: i64 = 500;

/// Produces events with `id`, `value`, `hash` and `category` fields.
///
/// Also an infinite [`Iterator`] for synchronous use.
pub struct EventGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    value: i64,
    generated: u64,
}

impl EventGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            value: 0,
            generated: 0,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Number of events produced so far.
    pub fn generated(&self) -> u64 {
        self.generated
    }

    pub fn next_event(&mut self) -> Event {
        self.next_event_at(Utc::now())
    }

    /// Next event as if generated at `now`.
    pub fn next_event_at(&mut self, now: DateTime<Utc>) -> Event {
        let rng = &mut self.rng;
        let (value, timestamp) = match self.config.mode {
            GeneratorMode::Random => (rng.gen_range(0..=1000), now),
            GeneratorMode::Incremental => {
                self.value += rng.gen_range(0..=5);
                let jitter = chrono::Duration::milliseconds(rng.gen_range(0..=MAX_JITTER_MS));
                (self.value, now + jitter)
            }
        };

        self.generated += 1;
        Event::with_capacity(self.config.event_type.as_str(), 4)
            .with_timestamp(timestamp)
            .with_field("id", rng.gen_range(0..=1000i64))
            .with_field("value", value)
            .with_field("hash", format!("{:032x}", rng.gen::<u128>()))
            .with_field("category", rng.gen_range(0..=10i64))
    }

    /// Send events at the configured rate until `limit` is reached or the
    /// receiver goes away. Returns the number of events sent.
    pub async fn run(&mut self, sender: mpsc::Sender<Event>, limit: Option<u64>) -> u64 {
        let rate = self.config.events_per_second.max(1);
        let mut interval = time::interval(Duration::from_secs_f64(1.0 / rate as f64));
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

        let mut sent = 0;
        while limit.map_or(true, |limit| sent < limit) {
            interval.tick().await;
            let event = self.next_event();
            if sender.send(event).await.is_err() {
                tracing::debug!("Event generator stopping: receiver closed");
                break;
            }
            sent += 1;
        }
        sent
    }
}

impl Iterator for EventGenerator {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        Some(self.next_event())
    }
}

/// Create a generator plus the receiving end of its channel
pub fn create_generator(
    config: GeneratorConfig,
) -> (EventGenerator, mpsc::Sender<Event>, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(1000);
    (EventGenerator::new(config), tx, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(mode: GeneratorMode) -> EventGenerator {
        EventGenerator::new(GeneratorConfig {
            mode,
            seed: Some(7),
            ..Default::default()
        })
    }

    #[test]
    fn test_random_event_fields() {
        let now = Utc::now();
        let event = seeded(GeneratorMode::Random).next_event_at(now);

        assert_eq!(&*event.event_type, "StreamEvent");
        assert_eq!(event.timestamp, now);
        let keys: Vec<_> = event.data.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "value", "hash", "category"]);
        assert!((0..=1000).contains(&event.get_int("value").unwrap()));
        assert!((0..=10).contains(&event.get_int("category").unwrap()));
        assert_eq!(event.get_str("hash").unwrap().len(), 32);
    }

    #[test]
    fn test_incremental_values_never_decrease() {
        let now = Utc::now();
        let mut generator = seeded(GeneratorMode::Incremental);
        let mut last = 0;
        for _ in 0..200 {
            let event = generator.next_event_at(now);
            let value = event.get_int("value").unwrap();
            assert!(value >= last);
            last = value;

            let ahead = event.timestamp - now;
            assert!(ahead >= chrono::Duration::zero());
            assert!(ahead <= chrono::Duration::milliseconds(MAX_JITTER_MS));
        }
        assert_eq!(generator.generated(), 200);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let now = Utc::now();
        let mut a = seeded(GeneratorMode::Random);
        let mut b = seeded(GeneratorMode::Random);
        for _ in 0..5 {
            assert_eq!(a.next_event_at(now), b.next_event_at(now));
        }
    }

    #[test]
    fn test_iterator() {
        let events: Vec<Event> = seeded(GeneratorMode::Random).take(3).collect();
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("Incremental".parse::<GeneratorMode>(), Ok(GeneratorMode::Incremental));
        assert_eq!(GeneratorMode::Random.to_string(), "random");
        assert!("bursty".parse::<GeneratorMode>().is_err());
    }

    #[tokio::test]
    async fn test_run_respects_limit() {
        let (mut generator, tx, mut rx) = create_generator(GeneratorConfig {
            events_per_second: 1000,
            seed: Some(1),
            ..Default::default()
        });
        let sent = generator.run(tx, Some(5)).await;
        assert_eq!(sent, 5);

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 5);
    }
}
