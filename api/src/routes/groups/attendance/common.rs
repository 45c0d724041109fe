use chrono::{DateTime, NaiveDate, Utc};
use db::models::attendance_record::RecordStatus;
use db::models::attendance_session::{SessionKind, SessionStatus};
use serde::{Deserialize, Serialize};
use services::record_ledger::BulkEntry;
use services::session_manager::Session;

#[derive(Debug, Deserialize)]
pub struct OpenSessionReq {
    #[serde(rename = "type")]
    pub kind: SessionKind,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkReq {
    #[serde(default)]
    pub status: Option<RecordStatus>,
}

#[derive(Debug, Deserialize)]
pub struct BulkMarkReq {
    pub entries: Vec<BulkEntry>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub group_id: i64,
    pub opened_by: i64,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    pub status: SessionStatus,
    pub opened_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            id: s.id,
            group_id: s.group_id,
            opened_by: s.opened_by,
            date: s.date,
            kind: s.kind,
            status: s.status,
            opened_at: s.opened_at,
            expires_at: s.expires_at,
            closed_at: s.closed_at,
        }
    }
}
