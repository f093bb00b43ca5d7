//! Server-Sent Events push channel
//!
//! Each connection is one observer: it gets an `initial` event with the
//! current state, then an `update` event after every committed mutation.
//! Streams end when the shutdown token is cancelled.

use super::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use kjb_common::events::StateMessage;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, warn};

/// GET /api/events - SSE state stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    let stream = ctx
        .store
        .subscribe()
        .await
        .take_until(ctx.shutdown.clone().cancelled_owned())
        .filter_map(|message| async move { to_event(&message).map(Ok) });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(message: &StateMessage) -> Option<Event> {
    match Event::default()
        .event(message.kind.as_str())
        .id(message.state.revision.to_string())
        .json_data(message)
    {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to serialize state snapshot: {}", e);
            None
        }
    }
}
