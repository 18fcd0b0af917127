//! Server-sent event fan-out for `/fp/events`.
//!
//! The notification queue delivers into an [`EventHub`]; every open SSE
//! response holds one broadcast receiver. With no receiver the hub reports
//! itself unavailable, so the queue keeps its entries until a listener
//! connects.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use fpterm_terminal::{PendingEvent, Transport, TransportError};

/// Broadcast side of the event stream.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<PendingEvent>,
}

impl EventHub {
    /// `capacity` bounds how far a slow listener may fall behind.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PendingEvent> {
        self.tx.subscribe()
    }

    pub fn listeners(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Transport for EventHub {
    fn is_available(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    fn deliver(&self, event: &PendingEvent) -> Result<(), TransportError> {
        self.tx
            .send(event.clone())
            .map(|_| ())
            .map_err(|_| TransportError::Unavailable)
    }
}

/// SSE frame for one queued event: `event:` is the stream name, `id:` the
/// queue sequence number, `data:` the JSON payload.
pub fn to_sse_event(event: &PendingEvent) -> Event {
    Event::default()
        .event(event.kind.stream_name())
        .id(event.seq.to_string())
        .data(event.payload.as_str())
}

/// Turn a hub subscription into an SSE response body.
pub fn event_stream(
    receiver: broadcast::Receiver<PendingEvent>,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(receiver).filter_map(|item| match item {
        Ok(event) => Some(Ok(to_sse_event(&event))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "SSE listener fell behind");
            None
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive))
}
