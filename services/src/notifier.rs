//! Live per-session change events over the topic broadcast hub.
//!
//! Delivery is at-least-once per live subscriber and unordered across
//! members. Treat `RecordAdded` as a hint to refetch; `SessionClosed` is
//! final and ends every stream.

use chrono::{DateTime, Utc};
use db::models::attendance_record::{self, RecordStatus};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use util::ws::{self, WebSocketManager};

use crate::stats::SessionSummary;

pub const RECORD_ADDED: &str = "attendance.record_added";
pub const SESSION_CLOSED: &str = "attendance.session_closed";

pub fn topic(session_id: i64) -> String {
    format!("attendance:session:{session_id}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordAdded {
    pub session_id: i64,
    pub record_id: i64,
    pub student_id: i64,
    pub status: RecordStatus,
    pub marked_by: i64,
    pub marked_at: DateTime<Utc>,
}

impl From<&attendance_record::Model> for RecordAdded {
    fn from(r: &attendance_record::Model) -> Self {
        Self {
            session_id: r.session_id,
            record_id: r.id,
            student_id: r.student_id,
            status: r.status,
            marked_by: r.marked_by,
            marked_at: r.marked_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClosed {
    pub session_id: i64,
    pub closed_at: DateTime<Utc>,
    pub summary: SessionSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RecordAdded(RecordAdded),
    SessionClosed(SessionClosed),
}

impl SessionEvent {
    pub fn session_id(&self) -> i64 {
        match self {
            SessionEvent::RecordAdded(e) => e.session_id,
            SessionEvent::SessionClosed(e) => e.session_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::RecordAdded(_) => RECORD_ADDED,
            SessionEvent::SessionClosed(_) => SESSION_CLOSED,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::SessionClosed(_))
    }

    fn decode(raw: &str) -> Option<Self> {
        let env = ws::parse_envelope(raw)?;
        match env.event.as_str() {
            RECORD_ADDED => serde_json::from_value(env.payload)
                .ok()
                .map(SessionEvent::RecordAdded),
            SESSION_CLOSED => serde_json::from_value(env.payload)
                .ok()
                .map(SessionEvent::SessionClosed),
            _ => None,
        }
    }
}

/// Sends `event` to the session's topic. Returns how many subscribers got it.
pub async fn publish(ws: &WebSocketManager, event: &SessionEvent) -> usize {
    let topic = topic(event.session_id());
    let delivered = match event {
        SessionEvent::RecordAdded(p) => ws::emit(ws, &topic, RECORD_ADDED, p).await,
        SessionEvent::SessionClosed(p) => ws::emit(ws, &topic, SESSION_CLOSED, p).await,
    };
    tracing::debug!(topic = %topic, event = event.name(), delivered, "session event published");
    delivered
}

/// A handle on one session's events. Cheap to clone; holds no channel until
/// a stream from [`SessionSubscription::events`] is first polled.
#[derive(Clone)]
pub struct SessionSubscription {
    ws: WebSocketManager,
    session_id: i64,
}

pub fn subscribe(ws: &WebSocketManager, session_id: i64) -> SessionSubscription {
    SessionSubscription {
        ws: ws.clone(),
        session_id,
    }
}

impl SessionSubscription {
    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// A fresh event stream. Attaches to the channel on first poll, releases it
    /// on drop, and ends after `SessionClosed`. Call again to restart.
    pub fn events(&self) -> BoxStream<'static, SessionEvent> {
        let ws = self.ws.clone();
        let topic = topic(self.session_id);

        stream::once(async move {
            let rx = ws.subscribe(&topic).await;
            (rx, topic)
        })
        .flat_map(|(rx, topic)| {
            stream::unfold(Some(rx), move |state| {
                let topic = topic.clone();
                async move {
                    let mut rx = state?;
                    loop {
                        match rx.recv().await {
                            Ok(raw) => match SessionEvent::decode(&raw) {
                                Some(event) => {
                                    let next = if event.is_terminal() { None } else { Some(rx) };
                                    return Some((event, next));
                                }
                                None => {
                                    tracing::debug!(topic = %topic, "skipping unrecognised message");
                                }
                            },
                            Err(RecvError::Lagged(missed)) => {
                                tracing::warn!(topic = %topic, missed, "subscriber lagged, events skipped");
                            }
                            Err(RecvError::Closed) => return None,
                        }
                    }
                }
            })
        })
        .boxed()
    }
}
