//! Opening and closing attendance sessions.

use chrono::{DateTime, Utc};
use db::models::attendance_session::{self, SessionKind};
use sea_orm::{ConnectionTrait, TransactionTrait};
use util::state::AppState;

use crate::actor::Actor;
use crate::error::{AppError, AppResult};
use crate::group_settings::find_group;
use crate::notifier::{self, SessionClosed, SessionEvent};
use crate::reconciliation;
use crate::role_gate;
use crate::stats::{self, SessionSummary};

pub use db::models::attendance_session::Model as Session;

pub async fn get<C: ConnectionTrait>(db: &C, session_id: i64) -> AppResult<Session> {
    attendance_session::Model::find(db, session_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Session {session_id}")))
}

/// Like [`get`], but also requires the session to belong to `group_id`.
pub async fn get_in_group<C: ConnectionTrait>(
    db: &C,
    group_id: i64,
    session_id: i64,
) -> AppResult<Session> {
    let session = get(db, session_id).await?;
    if session.group_id != group_id {
        return Err(AppError::not_found(format!(
            "Session {session_id} in group {group_id}"
        )));
    }
    Ok(session)
}

pub async fn active_for_group<C: ConnectionTrait>(
    db: &C,
    group_id: i64,
) -> AppResult<Option<Session>> {
    Ok(attendance_session::Model::active_for_group(db, group_id).await?)
}

/// Completed sessions, most recent first.
pub async fn history<C: ConnectionTrait>(db: &C, group_id: i64) -> AppResult<Vec<Session>> {
    Ok(attendance_session::Model::completed_for_group(db, group_id).await?)
}

/// End of the self-marking window. Manual sessions have none.
pub fn expiry(session: &Session) -> Option<DateTime<Utc>> {
    session.expires_at
}

pub async fn open<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    group_id: i64,
    kind: SessionKind,
    now: DateTime<Utc>,
) -> AppResult<Session> {
    let group = find_group(db, group_id).await?;
    if !role_gate::can_open_session(actor, &group) {
        return Err(AppError::forbidden("only the group owner can open sessions"));
    }
    if kind == SessionKind::SelfMarked && !group.allow_self_attendance {
        return Err(AppError::validation(
            "self attendance is disabled for this group",
        ));
    }

    let session = attendance_session::Model::open(
        db,
        group_id,
        actor.member_id,
        kind,
        now,
        group.attendance_window_minutes,
    )
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict(format!("group {group_id} already has an active session"))
        } else {
            AppError::from(e)
        }
    })?;

    tracing::info!(
        group_id,
        session_id = session.id,
        kind = %kind,
        expires_at = ?session.expires_at,
        "attendance session opened"
    );
    Ok(session)
}

/// Closes a session: fills missing students as absent and completes it in one
/// transaction, then announces it. Closing a completed session returns its
/// summary unchanged.
pub async fn close(
    state: &AppState,
    actor: &Actor,
    session_id: i64,
    now: DateTime<Utc>,
) -> AppResult<SessionSummary> {
    let db = state.db();
    let session = get(db, session_id).await?;
    let group = find_group(db, session.group_id).await?;
    if !role_gate::can_open_session(actor, &group) {
        return Err(AppError::forbidden("only the group owner can close sessions"));
    }

    let txn = db.begin().await?;
    if !attendance_session::Model::claim_if_active(&txn, session_id, now).await? {
        txn.rollback().await?;
        tracing::debug!(session_id, "close on completed session");
        return stats::per_session_summary(db, session_id).await;
    }

    let report = match reconciliation::fill(&txn, &session, now).await {
        Ok(report) => report,
        Err(e) => {
            txn.rollback().await?;
            tracing::warn!(session_id, error = %e, "close aborted, session left active");
            return Err(e);
        }
    };
    if !attendance_session::Model::mark_completed(&txn, session_id, now).await? {
        txn.rollback().await?;
        return Err(AppError::Conflict(format!("session {session_id} changed while closing")));
    }
    txn.commit().await?;

    let summary = stats::per_session_summary(db, session_id).await?;
    let in_penalty = reconciliation::penalty_standings(db, group.id)
        .await?
        .iter()
        .filter(|s| s.in_penalty)
        .count();

    tracing::info!(
        group_id = group.id,
        session_id,
        filled = report.inserted,
        present = summary.present,
        total = summary.total,
        in_penalty,
        "attendance session closed"
    );

    notifier::publish(
        state.ws(),
        &SessionEvent::SessionClosed(SessionClosed {
            session_id,
            closed_at: now,
            summary: summary.clone(),
        }),
    )
    .await;

    Ok(summary)
}
