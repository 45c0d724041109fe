use super::handler_trait::WsHandler;
use super::serve::{WsServerOptions, serve_topic};
use crate::state::AppState;
use axum::{
    extract::{WebSocketUpgrade, ws::WebSocket},
    response::IntoResponse,
};
use std::sync::Arc;

/// Upgrade the request and serve `topic` with `handler`.
pub fn ws_route<H: WsHandler>(
    ws: WebSocketUpgrade,
    state: &AppState,
    user_id: Option<i64>,
    topic: String,
    handler: Arc<H>,
    opts: WsServerOptions,
) -> impl IntoResponse + use<H> {
    let manager = state.ws_clone();
    ws.on_upgrade(move |socket: WebSocket| async move {
        serve_topic(socket, manager, topic, user_id, handler, opts).await;
    })
}
