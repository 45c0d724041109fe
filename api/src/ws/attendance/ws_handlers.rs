use sea_orm::DatabaseConnection;
use serde::Deserialize;
use services::stats;
use util::ws::EventEnvelope;
use util::ws::handler_trait::WsHandler;
use util::ws::runtime::WsContext;

pub const SNAPSHOT: &str = "attendance.snapshot";

/// Client frames on an attendance session socket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttendanceIncoming {
    Ping,
    /// Ask for the current summary again.
    Refresh,
}

/// Dashboard socket for one session: pushes a summary snapshot on connect and
/// on request; live `attendance.*` events arrive through the topic.
pub struct AttendanceWsHandler {
    pub db: DatabaseConnection,
    pub session_id: i64,
}

impl AttendanceWsHandler {
    async fn send_snapshot(&self, ctx: &WsContext) {
        let summary = match stats::per_session_summary(&self.db, self.session_id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(session_id = self.session_id, error = %e, "snapshot failed");
                return;
            }
        };
        let env = EventEnvelope {
            r#type: "event",
            event: SNAPSHOT,
            topic: &ctx.topic,
            payload: &summary,
            ts: chrono::Utc::now().to_rfc3339(),
        };
        match serde_json::to_string(&env) {
            Ok(json) => {
                let _ = ctx.reply_text(json).await;
            }
            Err(e) => tracing::warn!(error = %e, "snapshot serialization failed"),
        }
    }
}

impl WsHandler for AttendanceWsHandler {
    type In = AttendanceIncoming;

    async fn on_open(&self, ctx: &WsContext) {
        self.send_snapshot(ctx).await;
    }

    async fn on_message(&self, ctx: &WsContext, msg: Self::In) {
        match msg {
            AttendanceIncoming::Ping => {
                let _ = ctx.reply_app_pong().await;
            }
            AttendanceIncoming::Refresh => self.send_snapshot(ctx).await,
        }
    }
}
