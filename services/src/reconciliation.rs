//! Close-time gap filling and read-time penalty derivation.

use chrono::{DateTime, Utc};
use db::models::attendance_record::{self, RecordStatus};
use db::models::attendance_session;
use db::models::group_member;
use sea_orm::ConnectionTrait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use util::config;

use crate::error::AppResult;
use crate::group_settings::find_group;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// Absences written by this run.
    pub inserted: usize,
    /// Students who turned out to have a record already.
    pub skipped: usize,
    /// Row attempts repeated after a failed pass.
    pub retried: usize,
}

/// Writes an `absent` record, marked by the student, for every student member
/// of the session's group that has none yet.
///
/// Runs on the caller's connection, normally the close transaction. Rows whose
/// insert fails are retried in further passes; if any still fail after the
/// configured number of passes the last error is returned and the caller's
/// transaction is expected to roll back.
pub async fn fill<C: ConnectionTrait>(
    db: &C,
    session: &attendance_session::Model,
    now: DateTime<Utc>,
) -> AppResult<FillReport> {
    let students = group_member::Model::students_in_group(db, session.group_id).await?;
    let marked: HashSet<i64> = attendance_record::Model::for_session(db, session.id)
        .await?
        .into_iter()
        .map(|r| r.student_id)
        .collect();

    let mut pending: Vec<i64> = students
        .iter()
        .map(|s| s.id)
        .filter(|id| !marked.contains(id))
        .collect();

    let mut report = FillReport::default();
    let attempts = config::reconciliation_fill_attempts().max(1);
    let mut pass = 1;

    loop {
        let mut failed = Vec::new();
        let mut last_err = None;

        for student_id in pending {
            match attendance_record::Model::insert_ignoring_duplicate(
                db,
                session.id,
                student_id,
                RecordStatus::Absent,
                student_id,
                now,
            )
            .await
            {
                Ok(true) => report.inserted += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(session_id = session.id, student_id, pass, error = %e, "absence fill failed");
                    failed.push(student_id);
                    last_err = Some(e);
                }
            }
        }

        match last_err {
            None => break,
            Some(e) if pass >= attempts => return Err(e.into()),
            Some(_) => {
                report.retried += failed.len();
                pending = failed;
                pass += 1;
            }
        }
    }

    tracing::debug!(
        session_id = session.id,
        inserted = report.inserted,
        skipped = report.skipped,
        retried = report.retried,
        "absences filled"
    );
    Ok(report)
}

/// Leading run of `absent` in a most-recent-first sequence.
pub fn absence_streak<I>(most_recent_first: I) -> u32
where
    I: IntoIterator<Item = RecordStatus>,
{
    most_recent_first
        .into_iter()
        .take_while(|s| *s == RecordStatus::Absent)
        .count() as u32
}

/// What a stored status reads as once the absence streak ending at it is known.
pub fn effective_status(stored: RecordStatus, streak: u32, threshold: i32) -> RecordStatus {
    if stored == RecordStatus::Absent && threshold > 0 && streak >= threshold as u32 {
        RecordStatus::Penalty
    } else {
        stored
    }
}

/// Completed sessions of a group with every record in them, indexed for
/// streak lookups.
pub struct GroupHistory {
    /// Most recent first, by `(opened_at, id)`.
    pub sessions: Vec<attendance_session::Model>,
    pub threshold: i32,
    records: HashMap<i64, Vec<attendance_record::Model>>,
    /// student -> session -> stored status
    by_student: HashMap<i64, HashMap<i64, RecordStatus>>,
}

impl GroupHistory {
    pub async fn load<C: ConnectionTrait>(db: &C, group_id: i64) -> AppResult<Self> {
        let group = find_group(db, group_id).await?;
        let sessions = attendance_session::Model::completed_for_group(db, group_id).await?;
        let ids: Vec<i64> = sessions.iter().map(|s| s.id).collect();
        let all = attendance_record::Model::for_sessions(db, &ids).await?;

        let mut records: HashMap<i64, Vec<attendance_record::Model>> = HashMap::new();
        let mut by_student: HashMap<i64, HashMap<i64, RecordStatus>> = HashMap::new();
        for r in all {
            by_student
                .entry(r.student_id)
                .or_default()
                .insert(r.session_id, r.status);
            records.entry(r.session_id).or_default().push(r);
        }

        Ok(Self {
            sessions,
            threshold: group.penalty_threshold,
            records,
            by_student,
        })
    }

    pub fn records_in(&self, session_id: i64) -> &[attendance_record::Model] {
        self.records.get(&session_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stored statuses of one student from `session_id` backwards, skipping
    /// sessions without a record. Empty if the session is not in the history.
    fn statuses_from(&self, student_id: i64, session_id: i64) -> Vec<RecordStatus> {
        let Some(mine) = self.by_student.get(&student_id) else {
            return Vec::new();
        };
        let Some(start) = self.sessions.iter().position(|s| s.id == session_id) else {
            return Vec::new();
        };
        self.sessions[start..]
            .iter()
            .filter_map(|s| mine.get(&s.id).copied())
            .collect()
    }

    pub fn streak_at(&self, student_id: i64, session_id: i64) -> u32 {
        absence_streak(self.statuses_from(student_id, session_id))
    }

    /// Streak ending at the student's most recent completed-session record.
    pub fn current_streak(&self, student_id: i64) -> u32 {
        self.sessions
            .first()
            .map(|s| self.streak_at(student_id, s.id))
            .unwrap_or(0)
    }

    pub fn effective_status(&self, record: &attendance_record::Model) -> RecordStatus {
        let streak = self.streak_at(record.student_id, record.session_id);
        effective_status(record.status, streak, self.threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PenaltyStanding {
    pub student_id: i64,
    pub streak: u32,
    pub in_penalty: bool,
}

/// Streak and penalty state of every current student as of the most recent
/// completed session.
pub async fn penalty_standings<C: ConnectionTrait>(
    db: &C,
    group_id: i64,
) -> AppResult<Vec<PenaltyStanding>> {
    let history = GroupHistory::load(db, group_id).await?;
    let students = group_member::Model::students_in_group(db, group_id).await?;

    Ok(students
        .into_iter()
        .map(|s| {
            let streak = history.current_streak(s.id);
            PenaltyStanding {
                student_id: s.id,
                streak,
                in_penalty: history.threshold > 0 && streak >= history.threshold as u32,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::classroom;
    use db::models::attendance_session::SessionKind;
    use db::models::attendance_record::RecordStatus::{Absent, Present};

    #[test]
    fn streak_counts_leading_absences_only() {
        assert_eq!(absence_streak([Absent, Absent, Present, Absent]), 2);
        assert_eq!(absence_streak([Present, Absent]), 0);
        assert_eq!(absence_streak(Vec::<RecordStatus>::new()), 0);
    }

    #[test]
    fn penalty_needs_absence_and_threshold() {
        assert_eq!(effective_status(Absent, 3, 3), RecordStatus::Penalty);
        assert_eq!(effective_status(Absent, 3, 4), Absent);
        assert_eq!(effective_status(Present, 9, 1), Present);
    }

    /// Opens and completes a manual session with the given stored statuses.
    async fn completed_session(
        db: &sea_orm::DatabaseConnection,
        group_id: i64,
        opener: i64,
        marks: &[(i64, RecordStatus)],
        at: DateTime<Utc>,
    ) -> attendance_session::Model {
        let s = attendance_session::Model::open(db, group_id, opener, SessionKind::Manual, at, 15)
            .await
            .unwrap();
        for (student, status) in marks {
            attendance_record::Model::create(db, s.id, *student, *status, opener, at)
                .await
                .unwrap();
        }
        attendance_session::Model::mark_completed(db, s.id, at).await.unwrap();
        s
    }

    #[tokio::test]
    async fn fill_writes_absent_for_unmarked_students_once() {
        let c = classroom(5, 15, 3).await;
        let db = c.state.db();
        let now = Utc::now();
        let s = attendance_session::Model::open(db, c.group.id, c.teacher.member_id, SessionKind::Manual, now, 15)
            .await
            .unwrap();
        for st in &c.students[..3] {
            attendance_record::Model::create(db, s.id, st.member_id, Present, c.teacher.member_id, now)
                .await
                .unwrap();
        }

        let report = fill(db, &s, now).await.unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.retried, 0);

        let records = attendance_record::Model::for_session(db, s.id).await.unwrap();
        assert_eq!(records.len(), 5);
        for r in records.iter().filter(|r| r.status == Absent) {
            assert_eq!(r.marked_by, r.student_id);
        }

        // re-running is harmless
        let again = fill(db, &s, now).await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(attendance_record::Model::for_session(db, s.id).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn three_absences_reach_threshold_three_but_not_four() {
        let c = classroom(1, 15, 3).await;
        let db = c.state.db();
        let student = c.students[0].member_id;
        let t0 = Utc::now() - chrono::Duration::days(10);

        let mut last = None;
        for day in 0..3 {
            let at = t0 + chrono::Duration::days(day);
            last = Some(
                completed_session(db, c.group.id, c.teacher.member_id, &[(student, Absent)], at).await,
            );
        }
        let last = last.unwrap();

        let history = GroupHistory::load(db, c.group.id).await.unwrap();
        assert_eq!(history.streak_at(student, last.id), 3);
        let record = &history.records_in(last.id)[0];
        assert_eq!(history.effective_status(record), RecordStatus::Penalty);
        assert_eq!(effective_status(record.status, 3, 4), Absent);

        let standings = penalty_standings(db, c.group.id).await.unwrap();
        assert_eq!(
            standings,
            vec![PenaltyStanding {
                student_id: student,
                streak: 3,
                in_penalty: true
            }]
        );
    }

    #[tokio::test]
    async fn presence_breaks_the_streak_and_missing_sessions_are_skipped() {
        let c = classroom(2, 15, 2).await;
        let db = c.state.db();
        let (a, b) = (c.students[0].member_id, c.students[1].member_id);
        let t0 = Utc::now() - chrono::Duration::days(10);
        let day = |n| t0 + chrono::Duration::days(n);

        completed_session(db, c.group.id, c.teacher.member_id, &[(a, Absent), (b, Absent)], day(0)).await;
        completed_session(db, c.group.id, c.teacher.member_id, &[(a, Present), (b, Absent)], day(1)).await;
        // a has no record here
        completed_session(db, c.group.id, c.teacher.member_id, &[(b, Present)], day(2)).await;
        let last =
            completed_session(db, c.group.id, c.teacher.member_id, &[(a, Absent), (b, Absent)], day(3)).await;

        let history = GroupHistory::load(db, c.group.id).await.unwrap();
        assert_eq!(history.streak_at(a, last.id), 1);
        assert_eq!(history.streak_at(b, last.id), 1);
        assert_eq!(history.current_streak(a), 1);
    }

    #[tokio::test]
    async fn fill_retries_a_row_that_failed_on_the_first_pass() {
        let c = classroom(3, 15, 3).await;
        let db = c.state.db();
        let now = Utc::now();
        let s = attendance_session::Model::open(db, c.group.id, c.teacher.member_id, SessionKind::Manual, now, 15)
            .await
            .unwrap();

        // the first student's insert fails until both others are written
        db.execute_unprepared(&format!(
            "CREATE TRIGGER flaky_fill BEFORE INSERT ON attendance_records \
             WHEN NEW.student_id = {} \
             AND (SELECT COUNT(*) FROM attendance_records WHERE session_id = NEW.session_id) < 2 \
             BEGIN SELECT RAISE(ABORT, 'flaky fill'); END;",
            c.students[0].member_id
        ))
        .await
        .unwrap();

        let report = fill(db, &s, now).await.unwrap();
        assert_eq!(report.inserted, 3);
        assert_eq!(report.retried, 1);
        assert_eq!(report.skipped, 0);

        let records = attendance_record::Model::for_session(db, s.id).await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.status == Absent));
    }

    #[tokio::test]
    async fn close_rolls_back_when_fill_keeps_failing() {
        let c = classroom(3, 15, 3).await;
        let db = c.state.db();
        let now = Utc::now();
        let s = attendance_session::Model::open(db, c.group.id, c.teacher.member_id, SessionKind::Manual, now, 15)
            .await
            .unwrap();
        attendance_record::Model::create(db, s.id, c.students[1].member_id, Present, c.teacher.member_id, now)
            .await
            .unwrap();

        db.execute_unprepared(&format!(
            "CREATE TRIGGER stuck_fill BEFORE INSERT ON attendance_records \
             WHEN NEW.student_id = {} \
             BEGIN SELECT RAISE(ABORT, 'stuck fill'); END;",
            c.students[0].member_id
        ))
        .await
        .unwrap();

        let err = crate::session_manager::close(&c.state, &c.teacher, s.id, now)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::Database(_)), "got {err:?}");

        let still_open = attendance_session::Model::find(db, s.id).await.unwrap().unwrap();
        assert!(still_open.is_active());
        assert!(still_open.closed_at.is_none());
        // absences written before the failure were rolled back with it
        assert_eq!(attendance_record::Model::for_session(db, s.id).await.unwrap().len(), 1);

        db.execute_unprepared("DROP TRIGGER stuck_fill").await.unwrap();

        let summary = crate::session_manager::close(&c.state, &c.teacher, s.id, now)
            .await
            .unwrap();
        assert_eq!((summary.present, summary.absent, summary.total), (1, 2, 3));
        assert!(!attendance_session::Model::find(db, s.id).await.unwrap().unwrap().is_active());
    }
}
