//! Overlay WebSocket upgrade handler (§4.3). Grounded on the teacher's
//! `ws_upgrade_handler`/`handle_connection` pair: accept the upgrade,
//! register the connection, run a write loop draining the fan-out channel
//! onto the socket until the peer disconnects.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::Query;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct OverlayQuery {
    pub channel: Option<String>,
    pub token: Option<String>,
}

pub async fn overlay_ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<OverlayQuery>,
    State(state): State<AppState>,
) -> Response {
    let channel = query.channel.filter(|c| !c.is_empty());

    let authenticated = match (&channel, &query.token) {
        (Some(channel), Some(token)) => {
            let now = ttsrelay_common::time::now_secs();
            crate::admin_token::verify_overlay_token(token, channel, &state.admin_secret, now).is_ok()
        }
        _ => false,
    };

    ws.on_upgrade(move |socket| handle_overlay_connection(socket, state, channel, authenticated))
}

async fn handle_overlay_connection(
    socket: WebSocket,
    state: AppState,
    channel: Option<String>,
    authenticated: bool,
) {
    let Some(channel) = channel else {
        close_with_policy_violation(socket).await;
        return;
    };
    let (mut sink, mut stream) = socket.split();
    let (id, mut rx) = state.fanout.register(&channel);
    debug!(%channel, %authenticated, connection = %id, "overlay client registered");

    let registered = ttsrelay_protocol::OverlayFrame::registered(channel.clone());
    if send_frame(&mut sink, &registered).await.is_err() {
        state.fanout.unregister(&channel, id);
        return;
    }

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Some(frame) => {
                        if send_frame(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        warn!(%channel, connection = %id, error = %err, "overlay socket error");
                        break;
                    }
                }
            }
        }
    }

    state.fanout.unregister(&channel, id);
    debug!(%channel, connection = %id, "overlay client unregistered");
}

async fn send_frame(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &ttsrelay_protocol::OverlayFrame,
) -> Result<(), axum::Error> {
    use futures::SinkExt;
    sink.send(Message::Text(frame.to_json().into())).await
}

/// WebSocket close code 1008, "Policy Violation" (RFC 6455 §7.4.1).
const WS_CLOSE_POLICY_VIOLATION: u16 = 1008;

async fn close_with_policy_violation(mut socket: WebSocket) {
    use futures::SinkExt;
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: WS_CLOSE_POLICY_VIOLATION,
            reason: "missing channel".into(),
        })))
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_channel_is_treated_as_missing() {
        let query = OverlayQuery { channel: Some(String::new()), token: None };
        assert!(query.channel.filter(|c| !c.is_empty()).is_none());
    }
}
