// =============================================================================
// WebSocket Handler — push on publication
// =============================================================================
//
// Clients connect to `/api/v1/ws` and receive:
//   1. The current snapshot immediately, if one has been published.
//   2. Every newly published snapshot, as soon as the cache swaps it in.
//
// Each outbound frame is wrapped with a per-connection sequence number.  A
// slow client only ever sees the latest snapshot; intermediate ones are
// skipped rather than queued.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app_state::AppState;
use crate::engine::SnapshotSlot;
use crate::snapshot::IntelligenceSnapshot;

#[derive(Serialize)]
struct SnapshotFrame<'a> {
    seq: u64,
    snapshot: &'a IntelligenceSnapshot,
}

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    info!("WebSocket connection accepted, upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

// =============================================================================
// Connection handler
// =============================================================================

/// Runs the push and receive sides concurrently via `tokio::select!` until
/// either the client goes away or the cache is dropped.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut published = state.cache.subscribe();
    let mut sequence: u64 = 0;

    let initial = state.cache.current();
    published.borrow_and_update();
    if let Err(e) = send_snapshot(&mut sender, initial, &mut sequence).await {
        warn!(error = %e, "failed to send initial WebSocket snapshot");
        return;
    }

    loop {
        tokio::select! {
            changed = published.changed() => {
                if changed.is_err() {
                    debug!("snapshot channel closed, disconnecting");
                    break;
                }
                let latest = published.borrow_and_update().clone();
                if let Err(e) = send_snapshot(&mut sender, latest, &mut sequence).await {
                    debug!(error = %e, "WebSocket send failed, disconnecting");
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = sender.send(Message::Pong(data)).await {
                            debug!(error = %e, "failed to send Pong, disconnecting");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket closed by client");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket receive error, disconnecting");
                        break;
                    }
                }
            }
        }
    }

    info!(frames = sequence, "WebSocket connection closed");
}

// =============================================================================
// Helpers
// =============================================================================

async fn send_snapshot<S>(
    sender: &mut S,
    slot: SnapshotSlot,
    sequence: &mut u64,
) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    let Some(snapshot) = slot else {
        return Ok(());
    };
    *sequence += 1;
    let frame = SnapshotFrame {
        seq: *sequence,
        snapshot: &snapshot,
    };

    match serde_json::to_string(&frame) {
        Ok(json) => {
            sender.send(Message::Text(json)).await?;
            debug!(seq = *sequence, cycle = %snapshot.cycle_id, "WebSocket snapshot sent");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "failed to serialise snapshot");
            // Serialisation errors are not network errors; don't disconnect.
            Ok(())
        }
    }
}
