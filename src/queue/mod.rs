//! In-memory delivery queue.
//!
//! Records are stamped and handed to a single drain worker task over an
//! unbounded channel, so enqueueing never waits on the network. The worker
//! pops the head, attempts delivery, and on failure parks the item on a
//! backoff timer that puts it back at the front of the queue.
//!
//! # Ordering
//!
//! Normal flow is FIFO. A retried item jumps ahead of anything enqueued
//! after it once its delay has elapsed, but items enqueued while the timer
//! is running are still attempted in the meantime.

mod backoff;
mod item;
mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

pub use backoff::{ExponentialBackoff, RetryConfig};
pub use item::{QueueItem, Record, TransactionRecord, SDK_TYPE};

use crate::error::{DucktError, Result};
use crate::events::{DeliveryEvent, EventSink};
use crate::metrics::DeliveryMetrics;
use crate::transport::Transport;
use worker::{report_drop, Command, DrainWorker};

/// State shared between the queue handle, the worker and retry timers
pub(crate) struct QueueShared {
    processing: AtomicBool,
    /// Depth of the worker's own queue as of its last publish
    pending: AtomicUsize,
    /// Items sent to the worker that it has not received yet
    in_channel: AtomicUsize,
    enqueued: AtomicU64,
    delivered: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
    /// Items not yet delivered or dropped, including ones on a retry timer
    outstanding: watch::Sender<usize>,
}

impl QueueShared {
    fn new() -> Self {
        let (outstanding, _) = watch::channel(0);
        Self {
            processing: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            in_channel: AtomicUsize::new(0),
            enqueued: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            retried: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            outstanding,
        }
    }

    pub(crate) fn set_processing(&self, processing: bool) {
        self.processing.store(processing, Ordering::Relaxed);
    }

    pub(crate) fn set_pending(&self, pending: usize) {
        self.pending.store(pending, Ordering::Relaxed);
    }

    pub(crate) fn sent(&self) {
        self.in_channel.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn received(&self) {
        self.in_channel.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn in_channel(&self) -> usize {
        self.in_channel.load(Ordering::Relaxed)
    }

    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn track(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.outstanding.send_modify(|n| *n += 1);
    }

    /// An item reached a final state (delivered or dropped)
    pub(crate) fn settle(&self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Items waiting to be attempted, including ones the worker has not
    /// picked up yet (not in flight, not on a retry timer)
    pub pending: usize,
    /// Items not yet delivered or dropped
    pub outstanding: usize,
    /// Whether the drain worker is currently working through items
    pub processing: bool,
    pub enqueued: u64,
    pub delivered: u64,
    pub retried: u64,
    pub dropped: u64,
}

/// Handle to a delivery queue and its drain worker.
///
/// # Example
///
/// ```rust,ignore
/// let queue = DeliveryQueue::spawn(transport, ExponentialBackoff::default(), EventSink::new(64))?;
/// queue.enqueue(Record::new().field("uri", "/x"));
/// queue.flush(Duration::from_secs(5)).await;
/// ```
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<Command>,
    shared: Arc<QueueShared>,
    events: EventSink,
    worker: Option<JoinHandle<()>>,
}

impl DeliveryQueue {
    /// Start the drain worker on the current Tokio runtime.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        backoff: ExponentialBackoff,
        events: EventSink,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| DucktError::RuntimeUnavailable)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(QueueShared::new());
        let worker = DrainWorker::new(
            rx,
            tx.downgrade(),
            transport,
            backoff,
            shared.clone(),
            events.clone(),
        );
        let worker = runtime.spawn(worker.run());

        Ok(Self {
            tx,
            shared,
            events,
            worker: Some(worker),
        })
    }

    /// Append a record to the tail of the queue. Never blocks.
    ///
    /// Returns the local id of the new item, as seen in [`DeliveryEvent`]s.
    pub fn enqueue(&self, record: Record) -> Uuid {
        let item = QueueItem::new(record);
        let id = item.id;

        self.shared.track();
        DeliveryMetrics::record_enqueued();
        self.events.emit(DeliveryEvent::Enqueued { id });

        self.shared.sent();
        if self.tx.send(Command::Enqueue(item)).is_err() {
            // Worker already stopped
            self.shared.received();
            report_drop(&self.shared, &self.events, id, 0, "worker stopped".to_string());
            self.shared.settle();
            return id;
        }

        tracing::debug!(item_id = %id, "Record enqueued");
        id
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<DeliveryEvent> {
        self.events.subscribe()
    }

    pub fn outstanding(&self) -> usize {
        *self.shared.outstanding.borrow()
    }

    pub fn is_processing(&self) -> bool {
        self.shared.processing.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.shared.pending.load(Ordering::Relaxed) + self.shared.in_channel(),
            outstanding: self.outstanding(),
            processing: self.is_processing(),
            enqueued: self.shared.enqueued.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            retried: self.shared.retried.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
        }
    }

    /// Wait until every outstanding item is delivered or dropped.
    ///
    /// Returns false if `timeout` elapsed first. Nothing is cancelled.
    pub async fn flush(&self, timeout: Duration) -> bool {
        let mut rx = self.shared.outstanding.subscribe();
        let settled = matches!(
            tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0)).await,
            Ok(Ok(_))
        );
        settled
    }

    /// Flush, then stop the worker. Whatever is still queued afterwards is
    /// discarded. Returns whether the flush completed in time.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        let flushed = self.flush(timeout).await;
        if !flushed {
            tracing::warn!(
                outstanding = self.outstanding(),
                "Flush timed out, discarding remaining records"
            );
        }

        let _ = self.tx.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "Delivery worker panicked");
            }
        }

        flushed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use std::sync::Mutex;

    struct RecordingTransport {
        delivered: Mutex<Vec<Map<String, Value>>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn deliver(&self, payload: &Map<String, Value>) -> Result<()> {
            self.delivered.lock().unwrap().push(payload.clone());
            Ok(())
        }
    }

    fn recording() -> Arc<RecordingTransport> {
        Arc::new(RecordingTransport {
            delivered: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_spawn_without_runtime_fails() {
        let result = DeliveryQueue::spawn(recording(), ExponentialBackoff::default(), EventSink::new(8));
        assert!(matches!(result, Err(DucktError::RuntimeUnavailable)));
    }

    #[tokio::test]
    async fn test_enqueue_and_flush() {
        let transport = recording();
        let queue = DeliveryQueue::spawn(
            transport.clone(),
            ExponentialBackoff::default(),
            EventSink::new(8),
        )
        .unwrap();

        for i in 0..3 {
            queue.enqueue(Record::new().field("seq", i));
        }

        assert!(queue.flush(Duration::from_secs(5)).await);

        let delivered = transport.delivered.lock().unwrap();
        let seqs: Vec<i64> = delivered.iter().map(|p| p["seq"].as_i64().unwrap()).collect();
        assert_eq!(seqs, vec![0, 1, 2]);

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 3);
        assert_eq!(stats.delivered, 3);
        assert_eq!(stats.outstanding, 0);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn test_pending_counts_items_not_yet_received() {
        let queue =
            DeliveryQueue::spawn(recording(), ExponentialBackoff::default(), EventSink::new(8))
                .unwrap();

        // The worker has not been polled yet on this single-threaded runtime
        for i in 0..3 {
            queue.enqueue(Record::new().field("seq", i));
        }
        assert_eq!(queue.stats().pending, 3);

        assert!(queue.flush(Duration::from_secs(5)).await);
        assert_eq!(queue.stats().pending, 0);
    }

    #[tokio::test]
    async fn test_flush_on_empty_queue_returns_immediately() {
        let queue =
            DeliveryQueue::spawn(recording(), ExponentialBackoff::default(), EventSink::new(8))
                .unwrap();
        assert!(queue.flush(Duration::from_millis(10)).await);
    }

    #[tokio::test]
    async fn test_worker_stops_after_shutdown() {
        let queue =
            DeliveryQueue::spawn(recording(), ExponentialBackoff::default(), EventSink::new(8))
                .unwrap();
        let tx = queue.tx.clone();
        assert!(queue.shutdown(Duration::from_secs(1)).await);
        assert!(tx.send(Command::Shutdown).is_err());
    }
}
