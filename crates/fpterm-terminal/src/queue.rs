//! Bounded notification queue between event producers and the stream.
//!
//! Producers (coordinator, HTTP handlers, console, enrollment task) call
//! [`NotificationQueue::enqueue`], which never blocks on delivery and never
//! fails: when the ring is full the oldest undelivered entry is evicted.
//! The host loop calls [`NotificationQueue::drain_and_deliver`] to forward
//! entries, strictly FIFO, to a [`Transport`].
//!
//! Payloads are serialised and truncated before the lock is taken; the
//! critical section only moves entries in and out of the ring.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace, warn};

use fpterm_core::config::QueueConfig;
use fpterm_core::{Clock, Millis};

use crate::events::{EventKind, FpEvent};

/// One queued notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    /// Emission order, starting at 1.
    pub seq: u64,
    pub kind: EventKind,
    /// Serialised JSON body, at most `max_payload` bytes.
    pub payload: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("no listener connected")]
    Unavailable,

    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Delivery side of the queue.
pub trait Transport: Send + Sync {
    /// Whether anyone can currently receive events.
    fn is_available(&self) -> bool;

    /// Hand one event to the listeners.
    fn deliver(&self, event: &PendingEvent) -> Result<(), TransportError>;
}

#[derive(Debug)]
struct Ring {
    entries: VecDeque<PendingEvent>,
    next_seq: u64,
}

/// Fixed-capacity, drop-oldest event ring.
pub struct NotificationQueue {
    ring: Mutex<Ring>,
    capacity: usize,
    max_payload: usize,
    warn_interval_ms: u32,
    clock: Arc<dyn Clock>,
    last_warn: Mutex<Option<Millis>>,
    dropped: AtomicU64,
}

impl NotificationQueue {
    pub fn new(config: &QueueConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                entries: VecDeque::with_capacity(capacity),
                next_seq: 1,
            }),
            capacity,
            max_payload: config.max_payload,
            warn_interval_ms: config.warn_interval_ms,
            clock,
            last_warn: Mutex::new(None),
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue a raw payload. Evicts the oldest entry when full.
    pub fn enqueue(&self, kind: EventKind, payload: &str) {
        let payload = truncate_payload(payload, self.max_payload).to_string();

        let evicted = {
            let mut ring = self.ring.lock();
            let evicted = if ring.entries.len() >= self.capacity {
                ring.entries.pop_front()
            } else {
                None
            };
            let seq = ring.next_seq;
            ring.next_seq += 1;
            ring.entries.push_back(PendingEvent { seq, kind, payload });
            evicted
        };

        if let Some(old) = evicted {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(seq = old.seq, kind = %old.kind, dropped, "Queue full, dropped oldest event");
        } else {
            trace!(%kind, "Event queued");
        }
    }

    /// Serialise and queue an event.
    pub fn emit(&self, event: &FpEvent) {
        match serde_json::to_string(event) {
            Ok(json) => self.enqueue(event.kind(), &json),
            Err(e) => warn!(error = %e, kind = %event.kind(), "Failed to serialise event"),
        }
    }

    /// Forward queued events in order while the transport accepts them.
    ///
    /// Returns the number delivered. Yields to the runtime between
    /// deliveries. An event the transport rejects goes back to the front
    /// unless newer events already filled the ring.
    pub async fn drain_and_deliver<T: Transport + ?Sized>(&self, transport: &T) -> usize {
        if self.is_empty() {
            return 0;
        }
        if !transport.is_available() {
            self.warn_unavailable();
            return 0;
        }

        let mut delivered = 0;
        loop {
            let Some(event) = self.ring.lock().entries.pop_front() else {
                break;
            };
            match transport.deliver(&event) {
                Ok(()) => {
                    trace!(seq = event.seq, kind = %event.kind, "Event delivered");
                    delivered += 1;
                }
                Err(e) => {
                    debug!(seq = event.seq, error = %e, "Delivery failed, keeping event");
                    self.requeue_front(event);
                    break;
                }
            }
            tokio::task::yield_now().await;
        }
        delivered
    }

    fn requeue_front(&self, event: PendingEvent) {
        let mut ring = self.ring.lock();
        if ring.entries.len() < self.capacity {
            ring.entries.push_front(event);
        } else {
            drop(ring);
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn warn_unavailable(&self) {
        let now = self.clock.now();
        let mut last = self.last_warn.lock();
        let due = match *last {
            None => true,
            Some(at) => now.since(at) >= self.warn_interval_ms,
        };
        if due {
            *last = Some(now);
            drop(last);
            warn!(pending = self.len(), "No event listener connected, holding events");
        }
    }

    pub fn len(&self) -> usize {
        self.ring.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries evicted or lost so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Copy of the pending entries, oldest first.
    pub fn snapshot(&self) -> Vec<PendingEvent> {
        self.ring.lock().entries.iter().cloned().collect()
    }
}

impl std::fmt::Debug for NotificationQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationQueue")
            .field("pending", &self.len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}

fn truncate_payload(payload: &str, max: usize) -> &str {
    if payload.len() <= max {
        return payload;
    }
    let mut end = max;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    &payload[..end]
}
