//! Server-Sent Events stream of playback events.
//!
//! Each [`PlaybackEvent`](crate::playback::PlaybackEvent) becomes one SSE
//! message whose `event:` field is the event type (`started`,
//! `step_started`, `step_completed`, `completed`, `cancelled`) and whose data
//! is the event as JSON.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use super::handlers::ApiState;
use crate::config::defaults;

/// GET /api/v1/events
pub async fn event_stream(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(
        subscribers = state.events.subscriber_count() + 1,
        "New SSE client connected"
    );

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.kind.name()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize playback event: {}", e);
                    None
                }
            },
            Err(e) => {
                // Lagged: the client missed events but the stream stays open.
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(defaults::SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}
