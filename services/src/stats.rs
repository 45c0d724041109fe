//! Per-session, per-student and per-group attendance statistics.
//!
//! History and rollups read completed sessions only. Penalty counts are
//! derived from absence streaks at read time.

use db::models::attendance_record::{self, RecordStatus};
use db::models::attendance_session;
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};

use crate::actor::Actor;
use crate::error::{AppError, AppResult};
use crate::reconciliation::GroupHistory;
use crate::session_manager;

/// `present / total * 100` rounded to one decimal; 0 when there is nothing to count.
pub fn percentage(present: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (present as f64 * 1000.0 / total as f64).round() / 10.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Counts {
    pub present: u64,
    pub absent: u64,
    pub penalty: u64,
    pub total: u64,
}

impl Counts {
    fn add(&mut self, status: RecordStatus) {
        match status {
            RecordStatus::Present => self.present += 1,
            RecordStatus::Absent => self.absent += 1,
            RecordStatus::Penalty => self.penalty += 1,
        }
        self.total += 1;
    }

    fn merge(&mut self, other: Counts) {
        self.present += other.present;
        self.absent += other.absent;
        self.penalty += other.penalty;
        self.total += other.total;
    }

    pub fn percentage(&self) -> f64 {
        percentage(self.present, self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: i64,
    pub present: u64,
    pub absent: u64,
    pub penalty: u64,
    pub total: u64,
    pub percentage: f64,
}

impl SessionSummary {
    fn new(session_id: i64, c: Counts) -> Self {
        Self {
            session_id,
            present: c.present,
            absent: c.absent,
            penalty: c.penalty,
            total: c.total,
            percentage: c.percentage(),
        }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            present: self.present,
            absent: self.absent,
            penalty: self.penalty,
            total: self.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentSummary {
    pub group_id: i64,
    pub student_id: i64,
    pub present: u64,
    pub absent: u64,
    pub penalty: u64,
    pub total: u64,
    pub percentage: f64,
    pub current_streak: u32,
    pub in_penalty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRollup {
    pub group_id: i64,
    /// Completed sessions counted.
    pub sessions: u64,
    pub present: u64,
    pub absent: u64,
    pub penalty: u64,
    pub total: u64,
    /// Pooled: all present over all records, not a mean of session percentages.
    pub percentage: f64,
}

fn summarise_completed(history: &GroupHistory, session_id: i64) -> SessionSummary {
    let mut c = Counts::default();
    for r in history.records_in(session_id) {
        c.add(history.effective_status(r));
    }
    SessionSummary::new(session_id, c)
}

pub async fn per_session_summary<C: ConnectionTrait>(
    db: &C,
    session_id: i64,
) -> AppResult<SessionSummary> {
    let session = session_manager::get(db, session_id).await?;

    if session.is_active() {
        // not history yet, so no streaks apply
        let mut c = Counts::default();
        for r in attendance_record::Model::for_session(db, session_id).await? {
            c.add(r.status);
        }
        return Ok(SessionSummary::new(session_id, c));
    }

    let history = GroupHistory::load(db, session.group_id).await?;
    Ok(summarise_completed(&history, session_id))
}

pub async fn per_student_summary<C: ConnectionTrait>(
    db: &C,
    group_id: i64,
    student_id: i64,
) -> AppResult<StudentSummary> {
    let member = Actor::by_member_id(db, student_id).await?;
    if member.group_id != group_id || !member.is_student() {
        return Err(AppError::not_found(format!(
            "Student {student_id} in group {group_id}"
        )));
    }

    let history = GroupHistory::load(db, group_id).await?;

    let mut c = Counts::default();
    for s in &history.sessions {
        if let Some(r) = history
            .records_in(s.id)
            .iter()
            .find(|r| r.student_id == student_id)
        {
            c.add(history.effective_status(r));
        }
    }

    let current_streak = history.current_streak(student_id);
    Ok(StudentSummary {
        group_id,
        student_id,
        present: c.present,
        absent: c.absent,
        penalty: c.penalty,
        total: c.total,
        percentage: c.percentage(),
        current_streak,
        in_penalty: history.threshold > 0 && current_streak >= history.threshold as u32,
    })
}

pub async fn group_rollup<C: ConnectionTrait>(db: &C, group_id: i64) -> AppResult<GroupRollup> {
    let history = GroupHistory::load(db, group_id).await?;

    let mut pooled = Counts::default();
    for s in &history.sessions {
        pooled.merge(summarise_completed(&history, s.id).counts());
    }

    Ok(GroupRollup {
        group_id,
        sessions: history.sessions.len() as u64,
        present: pooled.present,
        absent: pooled.absent,
        penalty: pooled.penalty,
        total: pooled.total,
        percentage: pooled.percentage(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionHistoryEntry {
    #[serde(flatten)]
    pub session: attendance_session::Model,
    pub summary: SessionSummary,
}

/// Completed sessions with their summaries, most recent first.
pub async fn session_history<C: ConnectionTrait>(
    db: &C,
    group_id: i64,
) -> AppResult<Vec<SessionHistoryEntry>> {
    let history = GroupHistory::load(db, group_id).await?;
    Ok(history
        .sessions
        .iter()
        .map(|s| SessionHistoryEntry {
            session: s.clone(),
            summary: summarise_completed(&history, s.id),
        })
        .collect())
}
