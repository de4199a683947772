use chrono::{DateTime, Utc};
use serde::Serialize;
use sigbridge_core::FeedbackRecord;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("invalid feedback: {0}")]
    InvalidInput(String),
    #[error("feedback log I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One persisted line: the record as received plus the server-side arrival
/// time.
#[derive(Debug, Serialize)]
struct StoredFeedback<'a> {
    received_at: DateTime<Utc>,
    #[serde(flatten)]
    record: &'a FeedbackRecord,
}

/// Append-only recorder for execution outcomes.
///
/// The bridge does not check whether `signal_id` refers to a signal it still
/// knows about; correlation is the consumer's contract, retention is ours.
pub struct FeedbackLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FeedbackLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and durably append one record.
    pub fn record(&self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        record
            .validate()
            .map_err(|e| FeedbackError::InvalidInput(e.to_string()))?;

        let stored = StoredFeedback {
            received_at: Utc::now(),
            record,
        };
        let line = serde_json::to_string(&stored)
            .map_err(|e| FeedbackError::InvalidInput(e.to_string()))?;

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        file.flush()?;

        info!(
            signal_id = %record.signal_id,
            status = ?record.status,
            "feedback recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sigbridge_core::FeedbackStatus;
    use tempfile::TempDir;

    fn record(signal_id: &str, status: FeedbackStatus) -> FeedbackRecord {
        FeedbackRecord {
            signal_id: signal_id.to_string(),
            status,
            order_reference: Some("42".to_string()),
            execution_price: Some(Decimal::new(10875, 4)),
            message: Some("filled".to_string()),
            timestamp: None,
        }
    }

    #[test]
    fn test_duplicate_signal_ids_both_retained() {
        let dir = TempDir::new().unwrap();
        let log = FeedbackLog::new(dir.path().join("feedback.jsonl"));

        log.record(&record("s1", FeedbackStatus::Executed)).unwrap();
        log.record(&record("s1", FeedbackStatus::Failed)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["signal_id"], "s1");
            assert!(value["received_at"].is_string());
        }
    }

    #[test]
    fn test_empty_signal_id_rejected_and_not_written() {
        let dir = TempDir::new().unwrap();
        let log = FeedbackLog::new(dir.path().join("feedback.jsonl"));

        let bad = FeedbackRecord {
            signal_id: "  ".to_string(),
            status: FeedbackStatus::Rejected,
            order_reference: None,
            execution_price: None,
            message: None,
            timestamp: None,
        };
        assert!(matches!(
            log.record(&bad),
            Err(FeedbackError::InvalidInput(_))
        ));
        assert!(!log.path().exists());
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let dir = TempDir::new().unwrap();
        let log = FeedbackLog::new(dir.path().join("nested/logs/feedback.jsonl"));
        log.record(&record("s2", FeedbackStatus::Executed)).unwrap();
        assert!(log.path().exists());
    }
}
