pub mod axum_adapter;
pub mod handler_trait;
pub mod manager;
pub mod runtime;
pub mod serve;

pub use manager::WebSocketManager;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Standard event envelope sent over topics.
#[derive(Serialize)]
pub struct EventEnvelope<'a, T> {
    #[serde(rename = "type")]
    pub r#type: &'static str,
    pub event: &'a str,
    pub topic: &'a str,
    pub payload: T,
    pub ts: String,
}

/// Owned counterpart of [`EventEnvelope`] for the receiving side.
#[derive(Debug, Deserialize)]
pub struct IncomingEnvelope {
    pub event: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Broadcast a JSON-serialized `EventEnvelope` on `topic`.
///
/// Returns how many live receivers the message reached.
pub async fn emit<T: Serialize>(
    ws: &WebSocketManager,
    topic: &str,
    event: &str,
    payload: &T,
) -> usize {
    let env = EventEnvelope {
        r#type: "event",
        event,
        topic,
        payload,
        ts: Utc::now().to_rfc3339(),
    };
    match serde_json::to_string(&env) {
        Ok(json) => ws.broadcast(topic, json).await,
        Err(e) => {
            tracing::warn!(topic, event, error = %e, "failed to serialize event");
            0
        }
    }
}

/// Parse a raw topic message back into its envelope; `None` for anything malformed.
pub fn parse_envelope(raw: &str) -> Option<IncomingEnvelope> {
    serde_json::from_str(raw).ok()
}
