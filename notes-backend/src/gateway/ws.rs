//! `/ws` endpoint: every open connection is a broadcast subscriber.
//!
//! The server only pushes. Frames from the client are read solely to notice
//! when the connection goes away; their content is discarded. When the
//! broadcaster drops a subscriber, its connection is closed from this side.

use actix_web::{web, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, CloseReason, Message, MessageStream, Session};
use async_trait::async_trait;
use futures_util::StreamExt;
use notes_types::NoteEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::events::{DeliveryError, EventSink};
use super::{DisconnectReason, NoteEventBroadcaster, SubscriberId};
use crate::AppState;

/// Upper bound on queueing the final close frame. A client that stopped
/// reading can leave the outbound queue full.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Pushes events to one WebSocket session as JSON text frames.
pub struct WsSessionSink {
    session: Session,
    disconnect: Mutex<Option<oneshot::Sender<DisconnectReason>>>,
}

impl WsSessionSink {
    /// The receiver fires when the broadcaster closes this sink.
    pub fn new(session: Session) -> (Self, oneshot::Receiver<DisconnectReason>) {
        let (tx, rx) = oneshot::channel();
        let sink = Self {
            session,
            disconnect: Mutex::new(Some(tx)),
        };
        (sink, rx)
    }
}

fn encode_event(event: &NoteEvent) -> Result<String, DeliveryError> {
    Ok(serde_json::to_string(event)?)
}

fn close_code(reason: DisconnectReason) -> CloseCode {
    match reason {
        DisconnectReason::DeliveryFailed => CloseCode::Policy,
        DisconnectReason::ShuttingDown => CloseCode::Away,
    }
}

#[async_trait]
impl EventSink for WsSessionSink {
    async fn deliver(&self, event: &NoteEvent) -> Result<(), DeliveryError> {
        let json = encode_event(event)?;
        log::debug!("[GATEWAY] >>> {}", json);
        // Session handles are cheap clones over the same connection.
        let mut session = self.session.clone();
        session.text(json).await.map_err(|_| DeliveryError::Closed)
    }

    async fn close(&self, reason: DisconnectReason) {
        if let Some(tx) = self.disconnect.lock().take() {
            // The read loop may already be gone.
            let _ = tx.send(reason);
        }
    }
}

pub async fn ws_handler(
    req: HttpRequest,
    body: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, session, msg_stream) = actix_ws::handle(&req, body)?;

    let peer = req
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let broadcaster = Arc::clone(&state.broadcaster);
    let (sink, disconnect) = WsSessionSink::new(session.clone());
    let id = broadcaster.register(Arc::new(sink));
    log::info!("[GATEWAY] WebSocket client {} connected as {}", peer, id);

    actix_web::rt::spawn(watch_connection(id, session, msg_stream, disconnect, broadcaster));

    Ok(response)
}

/// Drain incoming frames until the client leaves or the broadcaster drops
/// the subscriber, then unregister and close the session.
async fn watch_connection(
    id: SubscriberId,
    mut session: Session,
    mut msg_stream: MessageStream,
    mut disconnect: oneshot::Receiver<DisconnectReason>,
    broadcaster: Arc<NoteEventBroadcaster>,
) {
    let mut close_reason: Option<CloseReason> = None;

    loop {
        tokio::select! {
            reason = &mut disconnect => {
                // A dropped sender means the sink left the registry without a close.
                let code = reason.map(close_code).unwrap_or(CloseCode::Normal);
                log::info!("[GATEWAY] Closing {} from server side ({:?})", id, code);
                close_reason = Some(code.into());
                break;
            }
            msg = msg_stream.next() => match msg {
                Some(Ok(Message::Ping(bytes))) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(reason))) => {
                    close_reason = reason;
                    break;
                }
                Some(Ok(Message::Text(text))) => {
                    log::debug!("[GATEWAY] <<< {} sent {} bytes (ignored)", id, text.len());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::warn!("[GATEWAY] Protocol error on {}: {}", id, e);
                    break;
                }
                None => break,
            },
        }
    }

    broadcaster.unregister(id);
    if tokio::time::timeout(CLOSE_TIMEOUT, session.close(close_reason))
        .await
        .is_err()
    {
        log::warn!("[GATEWAY] Gave up sending close frame to {}", id);
    }
    log::info!("[GATEWAY] WebSocket client {} disconnected", id);
}
