//! Delivery observation hook.
//!
//! Delivery outcomes never reach the caller of `send_request`. Subscribers of
//! this broadcast can still watch items move through the queue, which is how
//! drops and retries are observed in tests and diagnostics.

use std::time::Duration;

use tokio::sync::broadcast;
use uuid::Uuid;

/// Something that happened to a queued item
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryEvent {
    /// Item accepted onto the queue
    Enqueued { id: Uuid },
    /// Collector accepted the item
    Delivered { id: Uuid, attempts: u32 },
    /// Attempt failed, item comes back to the front after `delay`
    RetryScheduled {
        id: Uuid,
        attempt: u32,
        delay: Duration,
    },
    /// Retries exhausted, item discarded
    Dropped {
        id: Uuid,
        attempts: u32,
        reason: String,
    },
}

impl DeliveryEvent {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Enqueued { id }
            | Self::Delivered { id, .. }
            | Self::RetryScheduled { id, .. }
            | Self::Dropped { id, .. } => *id,
        }
    }
}

/// Cloneable sender side of the event broadcast
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<DeliveryEvent>,
}

impl EventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeliveryEvent> {
        self.tx.subscribe()
    }

    /// Emit an event. Having no subscribers is not an error.
    pub fn emit(&self, event: DeliveryEvent) {
        let _ = self.tx.send(event);
    }
}
