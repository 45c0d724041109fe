use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QueryTrait,
    Set,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::attendance_session::{self, SessionStatus};

/// One student's attendance outcome within one session.
///
/// `(session_id, student_id)` is unique; there is no update path, so a record
/// is immutable once written.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    /// Member id of the student.
    pub student_id: i64,
    pub status: RecordStatus,
    /// Member id of whoever wrote the record. Equals `student_id` for self-marks
    /// and for absences filled in at close.
    pub marked_by: i64,
    pub marked_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Display, EnumString,
    Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RecordStatus {
    #[sea_orm(string_value = "present")]
    Present,

    #[sea_orm(string_value = "absent")]
    Absent,

    /// Never stored; derived when reading a long enough absence streak.
    #[sea_orm(string_value = "penalty")]
    Penalty,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::attendance_session::Entity",
        from = "Column::SessionId",
        to = "super::attendance_session::Column::Id"
    )]
    Session,
    #[sea_orm(
        belongs_to = "super::group_member::Entity",
        from = "Column::StudentId",
        to = "super::group_member::Column::Id"
    )]
    Student,
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl Related<super::group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn on_session_student_conflict() -> OnConflict {
    OnConflict::columns([Column::SessionId, Column::StudentId])
        .do_nothing()
        .to_owned()
}

impl Model {
    /// Plain insert. A second record for the same `(session, student)` fails
    /// with a unique violation.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        session_id: i64,
        student_id: i64,
        status: RecordStatus,
        marked_by: i64,
        now: DateTime<Utc>,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            session_id: Set(session_id),
            student_id: Set(student_id),
            status: Set(status),
            marked_by: Set(marked_by),
            marked_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Inserts the record only while the session row is still `active`, as a
    /// single `INSERT .. SELECT .. WHERE status = 'active' ON CONFLICT DO NOTHING`.
    ///
    /// Returns false when nothing was written: either the session is no longer
    /// active or the student already has a record.
    pub async fn insert_if_session_active<C: ConnectionTrait>(
        db: &C,
        session_id: i64,
        student_id: i64,
        status: RecordStatus,
        marked_by: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let source = Query::select()
            .exprs([
                Expr::val(session_id),
                Expr::val(student_id),
                Expr::val(status),
                Expr::val(marked_by),
                Expr::val(now),
            ])
            .from(attendance_session::Entity)
            .and_where(attendance_session::Column::Id.eq(session_id))
            .and_where(attendance_session::Column::Status.eq(SessionStatus::Active))
            .to_owned();

        let mut insert = Query::insert();
        insert
            .into_table(Entity)
            .columns([
                Column::SessionId,
                Column::StudentId,
                Column::Status,
                Column::MarkedBy,
                Column::MarkedAt,
            ])
            .select_from(source)
            .map_err(|e| DbErr::Custom(format!("conditional insert: {e}")))?;
        insert.on_conflict(on_session_student_conflict());

        let res = db.execute(db.get_database_backend().build(&insert)).await?;
        Ok(res.rows_affected() == 1)
    }

    /// Insert that silently skips an existing `(session, student)` record.
    /// Returns whether a row was written.
    pub async fn insert_ignoring_duplicate<C: ConnectionTrait>(
        db: &C,
        session_id: i64,
        student_id: i64,
        status: RecordStatus,
        marked_by: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let active = ActiveModel {
            session_id: Set(session_id),
            student_id: Set(student_id),
            status: Set(status),
            marked_by: Set(marked_by),
            marked_at: Set(now),
            ..Default::default()
        };
        let stmt = Entity::insert(active)
            .on_conflict(on_session_student_conflict())
            .build(db.get_database_backend());

        let res = db.execute(stmt).await?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn for_session<C: ConnectionTrait>(
        db: &C,
        session_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    pub async fn find_for_student<C: ConnectionTrait>(
        db: &C,
        session_id: i64,
        student_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::SessionId.eq(session_id))
            .filter(Column::StudentId.eq(student_id))
            .one(db)
            .await
    }

    /// All records across a set of sessions.
    pub async fn for_sessions<C: ConnectionTrait>(
        db: &C,
        session_ids: &[i64],
    ) -> Result<Vec<Model>, DbErr> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::SessionId.is_in(session_ids.iter().copied()))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// One student's records across a set of sessions.
    pub async fn for_student_in_sessions<C: ConnectionTrait>(
        db: &C,
        student_id: i64,
        session_ids: &[i64],
    ) -> Result<Vec<Model>, DbErr> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::StudentId.eq(student_id))
            .filter(Column::SessionId.is_in(session_ids.iter().copied()))
            .all(db)
            .await
    }
}
