use std::{collections::HashSet, time::Duration};

use axum::response::sse::{Event, KeepAlive};
use jobtrack_core::Patch;
use metrics::counter;
use tokio::sync::broadcast;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

/// Fan-out of board patches to SSE subscribers.
#[derive(Clone)]
pub struct BoardEvents {
    sender: broadcast::Sender<Patch>,
}

impl BoardEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, patch: Patch) {
        counter!("board_patches_total", "type" => patch.kind_str()).increment(1);
        if self.sender.send(patch).is_err() {
            debug!(stage = "sse", "no subscribers for board patch");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Patch> {
        self.sender.subscribe()
    }
}

impl Default for BoardEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a patch as an SSE event named after its type, with the version as id.
pub fn patch_event(patch: &Patch) -> Result<Event, serde_json::Error> {
    let data = serde_json::to_string(patch)?;
    Ok(Event::default()
        .event(patch.kind_str())
        .id(patch.version.to_string())
        .data(data))
}

/// Streams patches newer than `after_version`, optionally restricted to `types`.
///
/// `initial` is emitted first; it lets a subscriber start from a full snapshot.
pub fn board_stream(
    receiver: broadcast::Receiver<Patch>,
    initial: Option<Patch>,
    after_version: u64,
    types: Option<HashSet<String>>,
) -> impl Stream<Item = Result<Event, serde_json::Error>> + Send + 'static {
    let head = tokio_stream::iter(initial.map(|patch| patch_event(&patch)));
    let live = BroadcastStream::new(receiver).filter_map(move |result| match result {
        Ok(patch) if patch.version <= after_version => None,
        Ok(patch) => match &types {
            Some(types) if !types.contains(patch.kind_str()) => None,
            _ => Some(patch_event(&patch)),
        },
        Err(err) => {
            warn!(stage = "sse", error = %err, "board subscriber lagged; patches dropped");
            None
        }
    });
    head.chain(live)
}

pub fn keep_alive(interval: Duration) -> KeepAlive {
    KeepAlive::new().interval(interval).text("heartbeat")
}

/// Parses a comma separated `types` filter; empty input means no filter.
pub fn parse_types(raw: Option<String>) -> Option<HashSet<String>> {
    let set: HashSet<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if set.is_empty() {
        None
    } else {
        Some(set)
    }
}
