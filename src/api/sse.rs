//! Server-Sent Events stream of normalized events

use super::AppState;
use crate::buffer::Sequenced;
use axum::{
    extract::State,
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

fn to_sse(seq: u64, event: &crate::event::AgentEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default()
        .id(seq.to_string())
        .event(event.action.as_str())
        .data(data)
}

fn last_event_id(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// `GET /events`
///
/// Each frame carries the buffer sequence number as its id. A reconnecting client
/// that sends `Last-Event-ID` first receives the buffered events it missed.
pub async fn events_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before the snapshot so nothing falls between the two
    let live_rx = state.buffer.subscribe();

    let backlog: Vec<Sequenced> = match last_event_id(&headers) {
        Some(since) => state.buffer.events_since(since),
        None => Vec::new(),
    };
    let replayed_up_to = backlog.last().map(|(seq, _)| *seq).unwrap_or(0);

    let replay = stream::iter(
        backlog
            .into_iter()
            .map(|(seq, event)| Ok(to_sse(seq, &event))),
    );

    let live = BroadcastStream::new(live_rx).filter_map(move |result| match result {
        Ok((seq, event)) if seq > replayed_up_to => Some(Ok(to_sse(seq, &event))),
        Ok(_) => None,
        Err(e) => {
            // Lagged
            tracing::debug!("SSE subscriber skipped events: {}", e);
            None
        }
    });

    Sse::new(replay.chain(live)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}
