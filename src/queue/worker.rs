//! The single drain worker that owns the queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};
use uuid::Uuid;

use super::backoff::ExponentialBackoff;
use super::item::QueueItem;
use super::QueueShared;
use crate::events::{DeliveryEvent, EventSink};
use crate::metrics::DeliveryMetrics;
use crate::transport::Transport;

/// Messages accepted by the drain worker
#[derive(Debug)]
pub(crate) enum Command {
    /// New item, goes to the back
    Enqueue(QueueItem),
    /// Item whose backoff elapsed, goes to the front
    Requeue(QueueItem),
    /// Stop draining and discard what is left
    Shutdown,
}

/// Owns the item sequence. Only this task pops items, so at most one
/// delivery attempt is in flight per queue.
pub(crate) struct DrainWorker {
    queue: VecDeque<QueueItem>,
    rx: mpsc::UnboundedReceiver<Command>,
    /// Weak so that dropping every client handle lets the worker finish
    requeue_tx: mpsc::WeakUnboundedSender<Command>,
    transport: Arc<dyn Transport>,
    backoff: ExponentialBackoff,
    shared: Arc<QueueShared>,
    events: EventSink,
}

impl DrainWorker {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<Command>,
        requeue_tx: mpsc::WeakUnboundedSender<Command>,
        transport: Arc<dyn Transport>,
        backoff: ExponentialBackoff,
        shared: Arc<QueueShared>,
        events: EventSink,
    ) -> Self {
        Self {
            queue: VecDeque::new(),
            rx,
            requeue_tx,
            transport,
            backoff,
            shared,
            events,
        }
    }

    pub(crate) async fn run(mut self) {
        tracing::info!(
            max_retries = self.backoff.config().max_retries,
            retry_delay_ms = self.backoff.config().retry_delay_ms,
            "Delivery worker started"
        );

        loop {
            if !self.absorb_pending() {
                break;
            }

            let Some(item) = self.queue.pop_front() else {
                self.shared.set_processing(false);
                self.publish_depth();

                // Idle until the next enqueue or due retry
                match self.rx.recv().await {
                    Some(command) => {
                        if !self.apply(command) {
                            break;
                        }
                        continue;
                    }
                    None => break,
                }
            };

            self.shared.set_processing(true);
            self.publish_depth();
            self.attempt(item).await;

            // Let other tasks run between items
            tokio::task::yield_now().await;
        }

        self.discard_remaining();
        self.shared.set_processing(false);
        self.publish_depth();
        tracing::info!("Delivery worker stopped");
    }

    /// Move every command that arrived during the last attempt into the
    /// queue. Returns false on shutdown.
    fn absorb_pending(&mut self) -> bool {
        loop {
            match self.rx.try_recv() {
                Ok(command) => {
                    if !self.apply(command) {
                        return false;
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return true,
            }
        }
    }

    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Enqueue(item) => {
                self.queue.push_back(item);
                self.shared.received();
            }
            Command::Requeue(item) => {
                tracing::debug!(
                    item_id = %item.id,
                    attempt = item.attempt_count,
                    "Retry due, requeued at front"
                );
                self.queue.push_front(item);
                self.shared.received();
            }
            Command::Shutdown => return false,
        }
        true
    }

    async fn attempt(&mut self, mut item: QueueItem) {
        let started = Instant::now();
        let result = self.transport.deliver(&item.payload).await;
        let elapsed = started.elapsed();
        let attempts = item.attempt_count + 1;

        match result {
            Ok(()) => {
                DeliveryMetrics::record_attempt(elapsed, true);
                self.shared.record_delivered();
                tracing::debug!(
                    item_id = %item.id,
                    attempts = attempts,
                    latency_ms = elapsed.as_millis() as u64,
                    "Record delivered"
                );
                self.events.emit(DeliveryEvent::Delivered {
                    id: item.id,
                    attempts,
                });
                self.finish();
            }
            Err(e) => {
                DeliveryMetrics::record_attempt(elapsed, false);

                if self.backoff.should_retry(item.attempt_count) {
                    item.attempt_count += 1;
                    let delay = self.backoff.delay_for(item.attempt_count);
                    tracing::warn!(
                        item_id = %item.id,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Delivery failed, retrying"
                    );
                    self.schedule_retry(item, delay);
                } else {
                    self.drop_item(item, attempts, e.to_string());
                }
            }
        }
    }

    /// Park the item on a timer; it reappears at the front once the delay
    /// elapses. The queue keeps draining in the meantime.
    fn schedule_retry(&mut self, item: QueueItem, delay: Duration) {
        let Some(tx) = self.requeue_tx.upgrade() else {
            let attempts = item.attempt_count;
            self.drop_item(item, attempts, "client closed".to_string());
            return;
        };

        DeliveryMetrics::record_retry_scheduled();
        self.shared.record_retried();
        self.events.emit(DeliveryEvent::RetryScheduled {
            id: item.id,
            attempt: item.attempt_count,
            delay,
        });

        let shared = self.shared.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.sent();
            if let Err(mpsc::error::SendError(Command::Requeue(item))) =
                tx.send(Command::Requeue(item))
            {
                // Worker stopped while the timer was running
                shared.received();
                report_drop(
                    &shared,
                    &events,
                    item.id,
                    item.attempt_count,
                    "shutdown".to_string(),
                );
                shared.settle();
            }
        });
    }

    fn drop_item(&mut self, item: QueueItem, attempts: u32, reason: String) {
        report_drop(&self.shared, &self.events, item.id, attempts, reason);
        self.finish();
    }

    /// Settle the item just handled. With nothing left to work on, the
    /// worker reads as idle before flush waiters are released.
    fn finish(&self) {
        if self.queue.is_empty() && self.shared.in_channel() == 0 {
            self.shared.set_processing(false);
        }
        self.shared.settle();
    }

    /// On shutdown nothing is persisted; leftovers are dropped.
    fn discard_remaining(&mut self) {
        self.rx.close();
        while let Ok(command) = self.rx.try_recv() {
            if let Command::Enqueue(item) | Command::Requeue(item) = command {
                self.queue.push_back(item);
                self.shared.received();
            }
        }

        let leftover = self.queue.len();
        while let Some(item) = self.queue.pop_front() {
            let attempts = item.attempt_count;
            self.drop_item(item, attempts, "shutdown".to_string());
        }

        if leftover > 0 {
            tracing::info!(discarded = leftover, "Discarded undelivered records on shutdown");
        }
    }

    fn publish_depth(&self) {
        self.shared.set_pending(self.queue.len());
        DeliveryMetrics::set_queue_depth(self.queue.len());
    }
}

/// Count, log and announce a discarded item. The caller settles it.
pub(crate) fn report_drop(
    shared: &QueueShared,
    events: &EventSink,
    id: Uuid,
    attempts: u32,
    reason: String,
) {
    DeliveryMetrics::record_dropped();
    shared.record_dropped();
    tracing::warn!(
        item_id = %id,
        attempts = attempts,
        reason = %reason,
        "Record dropped"
    );
    events.emit(DeliveryEvent::Dropped {
        id,
        attempts,
        reason,
    });
}
