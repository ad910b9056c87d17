//! Push channel: one WebSocket per observer.
//!
//! Each connection is a fresh subscription: the client first receives the
//! full status snapshot and the log backlog, then live events as JSON text
//! frames. A client that cannot keep up loses its mailbox and the socket is
//! closed; reconnecting gives a full resync.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::control::ControlSurface;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WsQuery {
    pub backlog: Option<usize>,
}

pub(crate) async fn upgrade(
    ws: WebSocketUpgrade,
    State(surface): State<ControlSurface>,
    Query(query): Query<WsQuery>,
) -> ApiResult<Response> {
    let backlog = resolve_backlog(&surface, query.backlog)?;
    Ok(ws.on_upgrade(move |socket| serve(socket, surface, backlog)))
}

/// Requested backlog, or the configured default. Rejects more entries than
/// the log can hold.
pub(crate) fn resolve_backlog(surface: &ControlSurface, requested: Option<usize>) -> ApiResult<usize> {
    let sup = surface.supervisor();
    let capacity = sup.logs().capacity();
    match requested {
        None => Ok(sup.config().default_backlog.min(capacity)),
        Some(n) if n <= capacity => Ok(n),
        Some(n) => Err(ApiError::bad_request(format!(
            "backlog {n} exceeds log capacity {capacity}"
        ))),
    }
}

async fn serve(socket: WebSocket, surface: ControlSurface, backlog: usize) {
    let mut sub = surface.subscribe(backlog);
    let id = sub.id();
    let (mut tx, mut rx) = socket.split();
    debug!(subscriber = id, backlog, "push channel opened");
    surface.supervisor().logs().info("Push client connected");

    loop {
        tokio::select! {
            ev = sub.recv() => match ev {
                Some(ev) => {
                    if tx.send(Message::Text(ev.to_json().into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = tx.send(Message::Close(None)).await;
                    break;
                }
            },
            msg = rx.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    drop(sub);
    surface.supervisor().logs().info("Push client disconnected");
    debug!(subscriber = id, "push channel closed");
}
