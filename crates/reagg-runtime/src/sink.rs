//! Sink implementations for window results

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reagg_core::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::error;

/// Aggregate reported by a window trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    /// Operator name, e.g. `COUNT`
    pub operator: String,
    /// Lowered aggregate over the live events
    pub value: Value,
    pub produced_at: DateTime<Utc>,
    /// Number of events in the window when the result was produced
    pub live_events: usize,
}

impl fmt::Display for WindowResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[RA,{}]: {}", self.operator, self.value)
    }
}

/// Trait for result sinks
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Name of this sink
    fn name(&self) -> &str;

    /// Deliver one window result
    async fn send(&self, result: &WindowResult) -> Result<()>;

    /// Flush any buffered data
    async fn flush(&self) -> Result<()>;
}

/// Console sink - prints to stdout
pub struct ConsoleSink {
    name: String,
    pretty: bool,
}

impl ConsoleSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pretty: true,
        }
    }

    /// Print one JSON object per result instead of `[RA,NAME]: value`.
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }
}

#[async_trait]
impl ResultSink for ConsoleSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, result: &WindowResult) -> Result<()> {
        if self.pretty {
            println!("{}", result);
        } else {
            println!("{}", serde_json::to_string(result)?);
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// File sink - writes JSON lines to a file
pub struct FileSink {
    name: String,
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            name: name.into(),
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, result: &WindowResult) -> Result<()> {
        let json = serde_json::to_string(result)?;
        let mut file = self.file.lock().await;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush()?;
        Ok(())
    }
}

/// Channel sink - forwards results to an in-process receiver
pub struct ChannelSink {
    name: String,
    tx: mpsc::Sender<WindowResult>,
}

impl ChannelSink {
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<WindowResult>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    /// Sink plus the receiving end of a bounded channel.
    pub fn channel(
        name: impl Into<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<WindowResult>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(name, tx), rx)
    }
}

#[async_trait]
impl ResultSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, result: &WindowResult) -> Result<()> {
        self.tx
            .send(result.clone())
            .await
            .map_err(|_| anyhow::anyhow!("result receiver for sink {} was dropped", self.name))
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Multi-sink that broadcasts to multiple sinks
pub struct MultiSink {
    name: String,
    sinks: Vec<Box<dyn ResultSink>>,
}

impl MultiSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sinks: Vec::new(),
        }
    }

    pub fn add(mut self, sink: Box<dyn ResultSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl ResultSink for MultiSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, result: &WindowResult) -> Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.send(result).await {
                error!("Sink {} error: {}", sink.name(), e);
            }
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        for sink in &self.sinks {
            sink.flush().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn result(value: i64) -> WindowResult {
        WindowResult {
            operator: "COUNT".to_string(),
            value: Value::Int(value),
            produced_at: Utc::now(),
            live_events: value as usize,
        }
    }

    #[test]
    fn test_window_result_display() {
        assert_eq!(result(3).to_string(), "[RA,COUNT]: 3");
    }

    // ==========================================================================
    // ConsoleSink Tests
    // ==========================================================================

    #[tokio::test]
    async fn test_console_sink() {
        let sink = ConsoleSink::new("test");
        assert!(sink.send(&result(1)).await.is_ok());
        assert_eq!(sink.name(), "test");
    }

    #[tokio::test]
    async fn test_console_sink_compact() {
        let sink = ConsoleSink::new("test").compact();
        assert!(!sink.pretty);
        assert!(sink.send(&result(1)).await.is_ok());
        assert!(sink.flush().await.is_ok());
    }

    // ==========================================================================
    // FileSink Tests
    // ==========================================================================

    #[tokio::test]
    async fn test_file_sink() {
        let temp_file = NamedTempFile::new().unwrap();
        let sink = FileSink::new("test_file", temp_file.path()).unwrap();
        assert_eq!(sink.path(), temp_file.path());

        assert!(sink.send(&result(7)).await.is_ok());
        assert!(sink.send(&result(8)).await.is_ok());
        assert!(sink.flush().await.is_ok());

        let contents = std::fs::read_to_string(temp_file.path()).unwrap();
        let lines: Vec<WindowResult> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].value, Value::Int(7));
        assert_eq!(lines[1].operator, "COUNT");
    }

    // ==========================================================================
    // ChannelSink Tests
    // ==========================================================================

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::channel("chan", 4);
        sink.send(&result(5)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().value, Value::Int(5));
    }

    #[tokio::test]
    async fn test_channel_sink_dropped_receiver() {
        let (sink, rx) = ChannelSink::channel("chan", 4);
        drop(rx);
        let err = sink.send(&result(5)).await.unwrap_err();
        assert!(err.to_string().contains("chan"));
    }

    // ==========================================================================
    // MultiSink Tests
    // ==========================================================================

    #[tokio::test]
    async fn test_multi_sink_empty() {
        let sink = MultiSink::new("multi");
        assert_eq!(sink.name(), "multi");
        assert!(sink.is_empty());
        assert!(sink.send(&result(1)).await.is_ok());
        assert!(sink.flush().await.is_ok());
    }

    #[tokio::test]
    async fn test_multi_sink_isolates_failures() {
        let (dead, rx) = ChannelSink::channel("dead", 1);
        drop(rx);
        let (live, mut live_rx) = ChannelSink::channel("live", 1);
        let multi = MultiSink::new("multi")
            .add(Box::new(dead))
            .add(Box::new(live));
        assert_eq!(multi.len(), 2);

        assert!(multi.send(&result(2)).await.is_ok());
        assert_eq!(live_rx.recv().await.unwrap().value, Value::Int(2));
    }
}
