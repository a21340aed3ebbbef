use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use tracing::{debug, instrument, warn};

use common::progress::progress_channel;

use crate::error::AppError;
use crate::state::AppState;

/// Live progress feed for one submission.
///
/// Upgrades to a WebSocket and forwards the submission's pub/sub events as
/// JSON text frames. The terminal `Completed`/`Error` event is end-of-stream
/// by convention; the socket itself stays open until the client goes away.
#[instrument(skip(state, ws), fields(submission_id = %id))]
pub async fn submission_progress(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let Some(events) = state.events.clone() else {
        return Err(AppError::Internal("progress channel unavailable".into()));
    };

    Ok(ws.on_upgrade(move |socket| forward_progress(socket, events, id)))
}

async fn forward_progress(mut socket: WebSocket, client: redis::Client, submission_id: i32) {
    let channel = progress_channel(submission_id);

    let mut subscription = match mq::pubsub::subscribe(&client, &channel).await {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(submission_id, error = %e, "Progress subscription failed");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    loop {
        tokio::select! {
            payload = subscription.next_payload() => {
                match payload {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // clients only listen on this socket
                    Some(Err(_)) => break,
                }
            }
        }
    }

    debug!(submission_id, "Progress socket closed");
}
