//! SSE event broadcaster for real-time event streaming.
//!
//! The broadcaster is the service's event emitter; every connected client
//! receives each `AppEvent` as one JSON `data:` frame.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use olb_core::{AppEvent, AppEventEmitter, BroadcastEmitter};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

#[derive(Debug, Clone, Default)]
pub struct SseBroadcaster {
    inner: BroadcastEmitter,
}

impl SseBroadcaster {
    /// Slow clients miss events once `capacity` are buffered.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: BroadcastEmitter::new(capacity),
        }
    }

    /// SSE response for one new client, with a 30s keep-alive.
    pub fn subscribe(
        self: Arc<Self>,
    ) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
        let stream = BroadcastStream::new(self.inner.subscribe()).filter_map(|result| match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().data(json))),
                Err(e) => {
                    tracing::warn!(error = %e, "failed to serialize event");
                    None
                }
            },
            Err(e) => {
                tracing::debug!(error = %e, "SSE client lagged");
                None
            }
        });

        Sse::new(stream).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(30))
                .text("ping"),
        )
    }
}

impl AppEventEmitter for SseBroadcaster {
    fn emit(&self, event: AppEvent) {
        self.inner.emit(event);
    }

    fn clone_box(&self) -> Box<dyn AppEventEmitter> {
        Box::new(self.clone())
    }
}
