use crate::store::{FileSignalQueue, QueueError};
use async_trait::async_trait;
use sigbridge_core::Signal;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Seam between the HTTP surface and the queue backend so handlers and their
/// tests do not need a real filesystem.
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Take the next pending signal, or `None` when the queue is empty.
    async fn pop_next(&self) -> Result<Option<Signal>, QueueError>;

    /// Number of records currently pending.
    async fn pending_count(&self) -> Result<usize, QueueError>;
}

#[async_trait]
impl SignalSource for FileSignalQueue {
    // Directory scans and renames are blocking syscalls, so they run on the
    // blocking pool instead of the runtime threads serving requests.
    async fn pop_next(&self) -> Result<Option<Signal>, QueueError> {
        let queue = self.clone();
        tokio::task::spawn_blocking(move || FileSignalQueue::pop_next(&queue))
            .await
            .map_err(join_error)?
    }

    async fn pending_count(&self) -> Result<usize, QueueError> {
        let queue = self.clone();
        tokio::task::spawn_blocking(move || Ok(queue.pending()?.len()))
            .await
            .map_err(join_error)?
    }
}

fn join_error(err: tokio::task::JoinError) -> QueueError {
    QueueError::Io(std::io::Error::new(std::io::ErrorKind::Other, err))
}

/// In-memory queue honoring the same atomic-pop contract. Test double for
/// the filesystem store.
#[derive(Debug, Default)]
pub struct MemorySignalQueue {
    signals: Mutex<VecDeque<Signal>>,
}

impl MemorySignalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, signal: Signal) {
        self.signals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(signal);
    }
}

#[async_trait]
impl SignalSource for MemorySignalQueue {
    async fn pop_next(&self) -> Result<Option<Signal>, QueueError> {
        Ok(self
            .signals
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front())
    }

    async fn pending_count(&self) -> Result<usize, QueueError> {
        Ok(self.signals.lock().unwrap_or_else(|e| e.into_inner()).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{write_signal, SignalFormat};
    use rust_decimal::Decimal;
    use sigbridge_core::Side;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_queue_pops_via_source_trait() {
        let dir = TempDir::new().unwrap();
        let queue = FileSignalQueue::new(dir.path());
        write_signal(
            &Signal::market("EURUSD", Side::Buy, Decimal::new(1, 2)),
            dir.path(),
            SignalFormat::Json,
        )
        .unwrap();

        let source: &dyn SignalSource = &queue;
        assert_eq!(source.pending_count().await.unwrap(), 1);
        let sig = source.pop_next().await.unwrap().unwrap();
        assert_eq!(sig.symbol, "EURUSD");
        assert!(source.pop_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_queue_is_fifo_and_consumes() {
        let queue = MemorySignalQueue::new();
        queue.push(Signal::market("EURUSD", Side::Buy, Decimal::ONE));
        queue.push(Signal::market("GBPUSD", Side::Sell, Decimal::ONE));

        assert_eq!(queue.pending_count().await.unwrap(), 2);
        assert_eq!(queue.pop_next().await.unwrap().unwrap().symbol, "EURUSD");
        assert_eq!(queue.pop_next().await.unwrap().unwrap().symbol, "GBPUSD");
        assert!(queue.pop_next().await.unwrap().is_none());
    }
}
