//! Match History
//!
//! The persistence sink for finished matches. A session calls
//! [`MatchSink::record_match`] exactly once, after `gameOver` has been
//! broadcast. Failures are the caller's to log; nothing is retried.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tracing::{debug, error, info};

/// One finished match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Display name on the left paddle.
    pub player1: String,
    /// Display name on the right paddle.
    pub player2: String,
    /// Display name of the winner.
    pub winner: String,
    /// Left paddle's final score.
    pub score1: u32,
    /// Right paddle's final score.
    pub score2: u32,
    /// When the winning point was scored.
    pub finished_at: DateTime<Utc>,
}

/// Errors while recording a match.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Could not write to the backing store.
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not encode the record.
    #[error("history encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink is unavailable.
    #[error("history sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for finished match results.
///
/// Sessions call this while holding their lock. Sinks that touch disk
/// or the network belong behind a [`BackgroundSink`].
pub trait MatchSink: Send + Sync {
    /// Persist a finished match.
    fn record_match(&self, record: &MatchRecord) -> Result<(), SinkError>;
}

/// Writes each result to the log and nowhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MatchSink for LogSink {
    fn record_match(&self, record: &MatchRecord) -> Result<(), SinkError> {
        info!(
            "Match result: {} {} - {} {} (winner {}) at {}",
            record.player1,
            record.score1,
            record.score2,
            record.player2,
            record.winner,
            record.finished_at.to_rfc3339(),
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesSink {
    /// Sink writing to `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MatchSink for JsonLinesSink {
    fn record_match(&self, record: &MatchRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self
            .lock
            .lock()
            .map_err(|_| SinkError::Unavailable("writer lock poisoned".to_string()))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Hands records to a dedicated writer thread.
///
/// `record_match` only queues; the wrapped sink runs on the writer
/// thread and its failures are logged there. Dropping the sink drains
/// the queue and joins the thread.
pub struct BackgroundSink {
    /// Sender for records (Option to allow explicit drop before join)
    tx: Option<mpsc::Sender<MatchRecord>>,
    /// Writer thread
    handle: Option<JoinHandle<()>>,
}

impl BackgroundSink {
    /// Start a writer thread feeding `inner`.
    pub fn spawn(inner: Arc<dyn MatchSink>) -> Result<Self, SinkError> {
        let (tx, rx) = mpsc::channel::<MatchRecord>();

        let handle = thread::Builder::new()
            .name("match-history".to_string())
            .spawn(move || {
                for record in rx {
                    if let Err(e) = inner.record_match(&record) {
                        error!("Failed to record {} vs {}: {}", record.player1, record.player2, e);
                    }
                }
                debug!("History writer exiting (channel disconnected)");
            })?;

        Ok(Self { tx: Some(tx), handle: Some(handle) })
    }
}

impl MatchSink for BackgroundSink {
    fn record_match(&self, record: &MatchRecord) -> Result<(), SinkError> {
        self.tx
            .as_ref()
            .ok_or_else(|| SinkError::Unavailable("writer stopped".to_string()))?
            .send(record.clone())
            .map_err(|_| SinkError::Unavailable("writer thread gone".to_string()))
    }
}

impl Drop for BackgroundSink {
    fn drop(&mut self) {
        // The sender must go first or the join never returns
        drop(self.tx.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Keeps records in memory. Used by tests and embedders that want to
/// inspect results in-process.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<MatchRecord>>,
}

impl MemorySink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn records(&self) -> Vec<MatchRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl MatchSink for MemorySink {
    fn record_match(&self, record: &MatchRecord) -> Result<(), SinkError> {
        self.records
            .lock()
            .map_err(|_| SinkError::Unavailable("record lock poisoned".to_string()))?
            .push(record.clone());
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(winner: &str) -> MatchRecord {
        MatchRecord {
            player1: "alice".to_string(),
            player2: "bob".to_string(),
            winner: winner.to_string(),
            score1: 3,
            score2: 5,
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_log_sink_accepts_everything() {
        assert!(LogSink.record_match(&sample("bob")).is_ok());
    }

    #[test]
    fn test_json_lines_appends() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("history.jsonl"));

        sink.record_match(&sample("bob")).unwrap();
        sink.record_match(&sample("alice")).unwrap();

        let contents = std::fs::read_to_string(sink.path()).unwrap();
        let records: Vec<MatchRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].winner, "bob");
        assert_eq!(records[1].winner, "alice");
        assert!(contents.contains("finishedAt"));
    }

    #[test]
    fn test_json_lines_missing_directory_errors() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("missing").join("history.jsonl"));

        assert!(matches!(sink.record_match(&sample("bob")), Err(SinkError::Io(_))));
    }

    struct BrokenSink;

    impl MatchSink for BrokenSink {
        fn record_match(&self, _record: &MatchRecord) -> Result<(), SinkError> {
            Err(SinkError::Unavailable("disk on fire".to_string()))
        }
    }

    #[test]
    fn test_background_sink_drains_on_drop() {
        let memory = Arc::new(MemorySink::new());
        let sink = BackgroundSink::spawn(memory.clone()).unwrap();

        sink.record_match(&sample("bob")).unwrap();
        sink.record_match(&sample("alice")).unwrap();
        drop(sink);

        let winners: Vec<String> = memory.records().into_iter().map(|r| r.winner).collect();
        assert_eq!(winners, vec!["bob", "alice"]);
    }

    #[test]
    fn test_background_sink_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let sink = BackgroundSink::spawn(Arc::new(JsonLinesSink::new(&path))).unwrap();

        sink.record_match(&sample("bob")).unwrap();
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_background_sink_swallows_inner_errors() {
        let sink = BackgroundSink::spawn(Arc::new(BrokenSink)).unwrap();

        assert!(sink.record_match(&sample("bob")).is_ok());
        assert!(sink.record_match(&sample("alice")).is_ok());
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemorySink::new();
        sink.record_match(&sample("bob")).unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].score2, 5);
    }
}
