use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast::error::RecvError, mpsc};

use super::WebSocketManager;
use super::handler_trait::WsHandler;
use super::runtime::WsContext;

#[derive(Debug, Clone, Copy)]
pub struct WsServerOptions {
    /// Interval between WS-level pings.
    pub ws_ping_sec: u64,
    /// Answer `{"type":"ping"}` text frames with an app-level pong.
    pub enable_app_ping: bool,
    /// Outbound frame queue per connection.
    pub outbound_buffer: usize,
}

impl Default for WsServerOptions {
    fn default() -> Self {
        Self {
            ws_ping_sec: 30,
            enable_app_ping: true,
            outbound_buffer: 64,
        }
    }
}

/// Serve one socket bound to `topic` until either side goes away.
///
/// Broadcasts on the topic are forwarded to the client; client frames are parsed
/// as `H::In` and dispatched. Presence is registered for `user_id` for the
/// lifetime of the connection and released on every exit path.
pub async fn serve_topic<H: WsHandler>(
    socket: WebSocket,
    manager: WebSocketManager,
    topic: String,
    user_id: Option<i64>,
    handler: Arc<H>,
    opts: WsServerOptions,
) {
    let mut rx = manager.subscribe(&topic).await;
    if let Some(uid) = user_id {
        manager.register(&topic, uid).await;
    }

    let (mut sink, mut socket_rx) = socket.split();

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(opts.outbound_buffer.max(1));
    let mut writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
    });

    let ctx = Arc::new(WsContext::new(
        topic.clone(),
        user_id,
        manager.clone(),
        out_tx.clone(),
    ));

    // topic -> client
    let mut forward_task = {
        let out_tx = out_tx.clone();
        let topic = topic.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => {
                        if out_tx.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %topic, skipped, "ws client lagged behind topic");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    };

    let mut ping_task = {
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(opts.ws_ping_sec.max(1)));
            interval.tick().await;
            loop {
                interval.tick().await;
                if out_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        })
    };
    drop(out_tx);

    handler.on_open(&ctx).await;

    // client -> handler
    let mut receive_task = {
        let handler = Arc::clone(&handler);
        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            while let Some(Ok(msg)) = socket_rx.next().await {
                match msg {
                    Message::Text(text) => {
                        let raw = text.as_str();
                        if opts.enable_app_ping && is_app_ping(raw) {
                            let _ = ctx.reply_app_pong().await;
                            continue;
                        }
                        match serde_json::from_str::<H::In>(raw) {
                            Ok(parsed) => handler.on_message(&ctx, parsed).await,
                            Err(e) => tracing::warn!(
                                topic = %ctx.topic,
                                error = %e,
                                "ignoring malformed ws message"
                            ),
                        }
                    }
                    Message::Ping(payload) => {
                        let _ = ctx.reply_pong(payload).await;
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        tracing::debug!(topic = %ctx.topic, "ignoring binary frame");
                    }
                    Message::Close(_) => break,
                }
            }
        })
    };

    // Whichever side finishes first tears the rest down.
    tokio::select! {
        _ = &mut receive_task => {},
        _ = &mut forward_task => {},
        _ = &mut writer_task => {},
    }
    receive_task.abort();
    forward_task.abort();
    ping_task.abort();
    writer_task.abort();

    handler.on_close(&ctx).await;
    if let Some(uid) = user_id {
        manager.unregister(&topic, uid).await;
    }
    tracing::info!(topic = %topic, "ws session ended");
}

fn is_app_ping(raw: &str) -> bool {
    matches!(
        serde_json::from_str::<Value>(raw),
        Ok(Value::Object(map)) if map.get("type").and_then(Value::as_str) == Some("ping")
    )
}

#[cfg(test)]
mod tests {
    use super::is_app_ping;

    #[test]
    fn recognises_app_ping_frames() {
        assert!(is_app_ping(r#"{"type":"ping"}"#));
        assert!(!is_app_ping(r#"{"type":"pong"}"#));
        assert!(!is_app_ping("ping"));
    }
}
