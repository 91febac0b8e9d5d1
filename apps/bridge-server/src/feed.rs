// [[CRAFTLINK]]/apps/bridge-server/src/feed.rs
// Purpose: Consumes the sidecar's protocol event stream and admits every event.
// Architecture: Infrastructure Adapter
// Dependencies: tokio-tungstenite, futures, tokio-util

use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tungstenite::Message;

use crate::buffer::EventBuffer;
use crate::error::FeedError;
use crate::events::Event;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FeedFrame {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    payload: Value,
}

/// Keeps the feed connected until `shutdown` fires, reconnecting with
/// capped exponential backoff.
pub async fn run_event_feed(url: String, buffer: Arc<EventBuffer>, shutdown: CancellationToken) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let outcome = tokio::select! {
            _ = shutdown.cancelled() => break,
            outcome = connect_and_read(&url, &buffer, &mut backoff) => outcome,
        };
        tracing::warn!("Event feed {} dropped: {}. Reconnecting in {}s", url, outcome, backoff.as_secs());

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }

    tracing::info!("Event feed stopped");
}

async fn connect_and_read(url: &str, buffer: &EventBuffer, backoff: &mut Duration) -> FeedError {
    let (mut stream, _) = match tokio_tungstenite::connect_async(url).await {
        Ok(connection) => connection,
        Err(e) => return e.into(),
    };
    tracing::info!("Connected to bot event feed at {}", url);
    *backoff = INITIAL_BACKOFF;

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                ingest_frame(&text, buffer);
            }
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => {
                    ingest_frame(&text, buffer);
                }
                Err(_) => tracing::warn!("Skipping non-UTF-8 binary frame from event feed"),
            },
            Ok(Message::Close(_)) => return FeedError::Closed,
            Ok(_) => {}
            Err(e) => return e.into(),
        }
    }
    FeedError::Closed
}

/// Admits one `{type, payload}` frame. Malformed frames are logged and skipped.
pub fn ingest_frame(text: &str, buffer: &EventBuffer) -> Option<Event> {
    match serde_json::from_str::<FeedFrame>(text) {
        Ok(frame) if !frame.event_type.is_empty() => Some(buffer.admit(&frame.event_type, frame.payload)),
        Ok(_) => {
            tracing::warn!("Skipping feed frame with empty event type");
            None
        }
        Err(e) => {
            tracing::warn!("Skipping malformed feed frame: {}", e);
            None
        }
    }
}
