use crate::ws::WebSocketManager;
use axum::extract::ws::{Message, Utf8Bytes};
use chrono::Utc;
use tokio::sync::mpsc;

/// Per-connection handle given to a [`WsHandler`](super::handler_trait::WsHandler).
pub struct WsContext {
    pub topic: String,
    pub user_id: Option<i64>,
    pub ws: WebSocketManager,
    out_tx: mpsc::Sender<Message>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientGone;

impl WsContext {
    pub fn new(
        topic: String,
        user_id: Option<i64>,
        ws: WebSocketManager,
        out_tx: mpsc::Sender<Message>,
    ) -> Self {
        Self {
            topic,
            user_id,
            ws,
            out_tx,
        }
    }

    /// Send a single text frame to this client only.
    pub async fn reply_text(&self, text: impl Into<Utf8Bytes>) -> Result<(), ClientGone> {
        self.send(Message::Text(text.into())).await
    }

    /// Send the application-level pong frame.
    pub async fn reply_app_pong(&self) -> Result<(), ClientGone> {
        self.reply_text(
            serde_json::json!({
                "event": "pong",
                "topic": self.topic,
                "payload": {},
                "ts": Utc::now().to_rfc3339(),
            })
            .to_string(),
        )
        .await
    }

    pub async fn reply_pong(&self, payload: bytes::Bytes) -> Result<(), ClientGone> {
        self.send(Message::Pong(payload)).await
    }

    pub async fn send(&self, msg: Message) -> Result<(), ClientGone> {
        self.out_tx.send(msg).await.map_err(|_| ClientGone)
    }
}
