//! Attendance record writes: student self-marks and teacher bulk marking.

use chrono::{DateTime, Utc};
use db::models::attendance_record::{self, RecordStatus};
use db::models::attendance_session::{self, SessionKind};
use db::models::group_member;
use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use util::state::AppState;

use crate::actor::Actor;
use crate::error::{AppError, AppResult};
use crate::group_settings::find_group;
use crate::notifier::{self, RecordAdded, SessionEvent};
use crate::role_gate::{self, Denial};
use crate::session_manager;

pub use db::models::attendance_record::Model as Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkEntry {
    pub student_id: i64,
    pub status: RecordStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub student_id: i64,
    pub profile_id: i64,
    pub record: Option<Record>,
}

fn reject_penalty(status: RecordStatus) -> AppResult<()> {
    if status == RecordStatus::Penalty {
        return Err(AppError::validation(
            "penalty is derived from absences and cannot be recorded",
        ));
    }
    Ok(())
}

async fn announce(state: &AppState, records: &[Record]) {
    for r in records {
        notifier::publish(state.ws(), &SessionEvent::RecordAdded(RecordAdded::from(r))).await;
    }
}

/// A student marking themselves in a self session.
///
/// The insert only lands while the session row is still `active`, so nothing
/// is accepted once a close has committed.
pub async fn submit(
    state: &AppState,
    actor: &Actor,
    session_id: i64,
    student_id: i64,
    status: RecordStatus,
    now: DateTime<Utc>,
) -> AppResult<Record> {
    let db = state.db();
    let session = session_manager::get(db, session_id).await?;
    if !session.is_active() {
        return Err(AppError::SessionClosed(session_id));
    }

    let group = find_group(db, session.group_id).await?;
    if actor.member_id != student_id {
        return Err(AppError::forbidden("students can only mark themselves"));
    }
    match role_gate::self_mark_denial(actor, &group, &session, now) {
        None => {}
        Some(Denial::WindowExpired { expired_at }) => {
            return Err(AppError::WindowExpired { expired_at });
        }
        Some(denial) => return Err(AppError::forbidden(denial.to_string())),
    }
    reject_penalty(status)?;

    let wrote = attendance_record::Model::insert_if_session_active(
        db, session_id, student_id, status, student_id, now,
    )
    .await?;

    if !wrote {
        let current = session_manager::get(db, session_id).await?;
        return Err(if current.is_active() {
            AppError::AlreadyMarked {
                session_id,
                student_id,
            }
        } else {
            AppError::SessionClosed(session_id)
        });
    }

    let record = attendance_record::Model::find_for_student(db, session_id, student_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Record for student {student_id}")))?;

    tracing::info!(session_id, student_id, status = %status, "self attendance recorded");
    announce(state, std::slice::from_ref(&record)).await;
    Ok(record)
}

/// The owning teacher marking a manual session. All entries commit together
/// or none do.
pub async fn bulk_submit(
    state: &AppState,
    actor: &Actor,
    session_id: i64,
    entries: &[BulkEntry],
    now: DateTime<Utc>,
) -> AppResult<Vec<Record>> {
    let db = state.db();
    let session = session_manager::get(db, session_id).await?;
    let group = find_group(db, session.group_id).await?;
    if !role_gate::can_open_session(actor, &group) {
        return Err(AppError::forbidden("only the group owner can mark attendance"));
    }
    if session.kind != SessionKind::Manual {
        return Err(AppError::validation(
            "bulk marking is only available for manual sessions",
        ));
    }
    if !session.is_active() {
        return Err(AppError::SessionClosed(session_id));
    }

    if entries.is_empty() {
        return Err(AppError::validation("no entries to record"));
    }
    let mut seen = HashSet::with_capacity(entries.len());
    for e in entries {
        reject_penalty(e.status)?;
        if !seen.insert(e.student_id) {
            return Err(AppError::validation(format!(
                "student {} appears more than once",
                e.student_id
            )));
        }
    }

    let students: HashMap<i64, group_member::Model> =
        group_member::Model::students_in_group(db, group.id)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect();
    if let Some(e) = entries.iter().find(|e| !students.contains_key(&e.student_id)) {
        return Err(AppError::not_found(format!(
            "Student {} in group {}",
            e.student_id, group.id
        )));
    }

    let txn = db.begin().await?;
    if !attendance_session::Model::claim_if_active(&txn, session_id, now).await? {
        txn.rollback().await?;
        return Err(AppError::SessionClosed(session_id));
    }

    let mut written = Vec::with_capacity(entries.len());
    for e in entries {
        match attendance_record::Model::create(
            &txn,
            session_id,
            e.student_id,
            e.status,
            actor.member_id,
            now,
        )
        .await
        {
            Ok(r) => written.push(r),
            Err(err) => {
                txn.rollback().await?;
                return Err(if db::is_unique_violation(&err) {
                    AppError::AlreadyMarked {
                        session_id,
                        student_id: e.student_id,
                    }
                } else {
                    AppError::from(err)
                });
            }
        }
    }
    txn.commit().await?;

    tracing::info!(
        session_id,
        marked_by = actor.member_id,
        count = written.len(),
        "bulk attendance recorded"
    );
    announce(state, &written).await;
    Ok(written)
}

/// Every current student of the session's group, with their record if any.
pub async fn roster<C: ConnectionTrait>(db: &C, session_id: i64) -> AppResult<Vec<RosterEntry>> {
    let session = session_manager::get(db, session_id).await?;
    let mut records: HashMap<i64, Record> = attendance_record::Model::for_session(db, session_id)
        .await?
        .into_iter()
        .map(|r| (r.student_id, r))
        .collect();

    Ok(group_member::Model::students_in_group(db, session.group_id)
        .await?
        .into_iter()
        .map(|m| RosterEntry {
            student_id: m.id,
            profile_id: m.profile_id,
            record: records.remove(&m.id),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_manager::{close, open};
    use crate::test_support::{classroom, now};
    use chrono::Duration;
    use futures::StreamExt;

    #[tokio::test]
    async fn self_submit_inside_window_and_rejected_after() {
        let c = classroom(2, 15, 3).await;
        let t = now();
        let s = open(c.state.db(), &c.teacher, c.group.id, SessionKind::SelfMarked, t)
            .await
            .unwrap();
        let (a, b) = (&c.students[0], &c.students[1]);

        let r = submit(&c.state, a, s.id, a.member_id, RecordStatus::Present, t + Duration::minutes(14))
            .await
            .unwrap();
        assert_eq!(r.marked_by, a.member_id);
        assert_eq!(r.status, RecordStatus::Present);

        let err = submit(&c.state, b, s.id, b.member_id, RecordStatus::Present, t + Duration::minutes(16))
            .await
            .unwrap_err();
        match err {
            AppError::WindowExpired { expired_at } => assert_eq!(expired_at, t + Duration::minutes(15)),
            other => panic!("expected WindowExpired, got {other:?}"),
        }
        // the session stays open after the window
        assert!(session_manager::get(c.state.db(), s.id).await.unwrap().is_active());
    }

    #[tokio::test]
    async fn double_submit_keeps_the_first_record() {
        let c = classroom(1, 15, 3).await;
        let t = now();
        let s = open(c.state.db(), &c.teacher, c.group.id, SessionKind::SelfMarked, t)
            .await
            .unwrap();
        let a = &c.students[0];

        let first = submit(&c.state, a, s.id, a.member_id, RecordStatus::Present, t).await.unwrap();
        let err = submit(&c.state, a, s.id, a.member_id, RecordStatus::Absent, t)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyMarked { .. }), "{err:?}");

        let records = attendance_record::Model::for_session(c.state.db(), s.id).await.unwrap();
        assert_eq!(records, vec![first]);
    }

    #[tokio::test]
    async fn concurrent_duplicate_submits_commit_once() {
        let c = classroom(1, 15, 3).await;
        let t = now();
        let s = open(c.state.db(), &c.teacher, c.group.id, SessionKind::SelfMarked, t)
            .await
            .unwrap();
        let a = c.students[0];

        let (x, y) = tokio::join!(
            submit(&c.state, &a, s.id, a.member_id, RecordStatus::Present, t),
            submit(&c.state, &a, s.id, a.member_id, RecordStatus::Present, t),
        );
        let oks = [x.is_ok(), y.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(oks, 1);
        let loser = x.err().or(y.err()).unwrap();
        assert!(matches!(loser, AppError::AlreadyMarked { .. }));
        assert_eq!(
            attendance_record::Model::for_session(c.state.db(), s.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn submit_after_close_is_rejected() {
        let c = classroom(1, 15, 3).await;
        let t = now();
        let s = open(c.state.db(), &c.teacher, c.group.id, SessionKind::SelfMarked, t)
            .await
            .unwrap();
        close(&c.state, &c.teacher, s.id, t).await.unwrap();

        let a = &c.students[0];
        let err = submit(&c.state, a, s.id, a.member_id, RecordStatus::Present, t)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SessionClosed(id) if id == s.id));
    }

    #[tokio::test]
    async fn submit_guards_identity_mode_and_status() {
        let c = classroom(2, 15, 3).await;
        let t = now();
        let s = open(c.state.db(), &c.teacher, c.group.id, SessionKind::SelfMarked, t)
            .await
            .unwrap();
        let (a, b) = (&c.students[0], &c.students[1]);

        let err = submit(&c.state, a, s.id, b.member_id, RecordStatus::Present, t)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = submit(&c.state, a, s.id, a.member_id, RecordStatus::Penalty, t)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = submit(&c.state, &c.teacher, s.id, c.teacher.member_id, RecordStatus::Present, t)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = submit(&c.state, a, 9999, a.member_id, RecordStatus::Present, t)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn manual_session_rejects_self_marks() {
        let c = classroom(1, 15, 3).await;
        let t = now();
        let s = open(c.state.db(), &c.teacher, c.group.id, SessionKind::Manual, t)
            .await
            .unwrap();
        let a = &c.students[0];
        let err = submit(&c.state, a, s.id, a.member_id, RecordStatus::Present, t)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn bulk_submit_writes_all_and_announces_each() {
        let c = classroom(3, 15, 3).await;
        let t = now();
        let s = open(c.state.db(), &c.teacher, c.group.id, SessionKind::Manual, t)
            .await
            .unwrap();

        let mut events = notifier::subscribe(c.state.ws(), s.id).events();
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(20), events.next())
                .await
                .is_err()
        );

        let entries: Vec<BulkEntry> = c
            .students
            .iter()
            .enumerate()
            .map(|(i, st)| BulkEntry {
                student_id: st.member_id,
                status: if i == 0 { RecordStatus::Absent } else { RecordStatus::Present },
            })
            .collect();
        let written = bulk_submit(&c.state, &c.teacher, s.id, &entries, t).await.unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|r| r.marked_by == c.teacher.member_id));

        for _ in 0..3 {
            assert!(matches!(events.next().await, Some(SessionEvent::RecordAdded(_))));
        }

        let roster = roster(c.state.db(), s.id).await.unwrap();
        assert_eq!(roster.len(), 3);
        assert!(roster.iter().all(|e| e.record.is_some()));
    }

    #[tokio::test]
    async fn bulk_submit_with_a_duplicate_persists_nothing() {
        let c = classroom(3, 15, 3).await;
        let t = now();
        let s = open(c.state.db(), &c.teacher, c.group.id, SessionKind::Manual, t)
            .await
            .unwrap();
        let (a, b, d) = (c.students[0], c.students[1], c.students[2]);

        bulk_submit(
            &c.state,
            &c.teacher,
            s.id,
            &[BulkEntry { student_id: b.member_id, status: RecordStatus::Present }],
            t,
        )
        .await
        .unwrap();

        let err = bulk_submit(
            &c.state,
            &c.teacher,
            s.id,
            &[
                BulkEntry { student_id: a.member_id, status: RecordStatus::Present },
                BulkEntry { student_id: b.member_id, status: RecordStatus::Absent },
                BulkEntry { student_id: d.member_id, status: RecordStatus::Present },
            ],
            t,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::AlreadyMarked { student_id, .. } if student_id == b.member_id));

        let records = attendance_record::Model::for_session(c.state.db(), s.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].student_id, b.member_id);
        assert_eq!(records[0].status, RecordStatus::Present);
    }

    #[tokio::test]
    async fn bulk_submit_validates_its_batch() {
        let c = classroom(2, 15, 3).await;
        let t = now();
        let s = open(c.state.db(), &c.teacher, c.group.id, SessionKind::Manual, t)
            .await
            .unwrap();
        let a = c.students[0];
        let entry = |student_id, status| BulkEntry { student_id, status };

        let err = bulk_submit(&c.state, &c.teacher, s.id, &[], t).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = bulk_submit(
            &c.state,
            &c.teacher,
            s.id,
            &[entry(a.member_id, RecordStatus::Present), entry(a.member_id, RecordStatus::Absent)],
            t,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = bulk_submit(&c.state, &c.teacher, s.id, &[entry(a.member_id, RecordStatus::Penalty)], t)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // the teacher's own membership is not a student
        let err = bulk_submit(
            &c.state,
            &c.teacher,
            s.id,
            &[entry(c.teacher.member_id, RecordStatus::Present)],
            t,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = bulk_submit(&c.state, &a, s.id, &[entry(a.member_id, RecordStatus::Present)], t)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn bulk_submit_rejects_self_sessions_and_closed_sessions() {
        let c = classroom(1, 15, 3).await;
        let t = now();
        let a = c.students[0];
        let batch = [BulkEntry { student_id: a.member_id, status: RecordStatus::Present }];

        let selfie = open(c.state.db(), &c.teacher, c.group.id, SessionKind::SelfMarked, t)
            .await
            .unwrap();
        let err = bulk_submit(&c.state, &c.teacher, selfie.id, &batch, t).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        close(&c.state, &c.teacher, selfie.id, t).await.unwrap();

        let manual = open(c.state.db(), &c.teacher, c.group.id, SessionKind::Manual, t)
            .await
            .unwrap();
        close(&c.state, &c.teacher, manual.id, t).await.unwrap();
        let err = bulk_submit(&c.state, &c.teacher, manual.id, &batch, t).await.unwrap_err();
        assert!(matches!(err, AppError::SessionClosed(_)));
    }
}
