use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One bounded attendance-taking event for a group.
///
/// `status` is the single source of truth for "is this session open"; it only
/// ever moves `active -> completed`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub group_id: i64,
    /// Member id of the teacher who opened the session.
    pub opened_by: i64,
    pub date: NaiveDate,
    pub kind: SessionKind,
    pub status: SessionStatus,
    pub opened_at: DateTime<Utc>,
    /// End of the self-marking window; `None` for manual sessions.
    pub expires_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Display, EnumString,
    Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum SessionKind {
    /// Teacher marks everyone.
    #[sea_orm(string_value = "manual")]
    #[serde(rename = "manual")]
    #[strum(serialize = "manual")]
    Manual,

    /// Students mark themselves within the window. Stored as `self_marked`,
    /// `self` on the wire.
    #[sea_orm(string_value = "self_marked")]
    #[serde(rename = "self")]
    #[strum(serialize = "self")]
    SelfMarked,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Display, EnumString,
    Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionStatus {
    #[sea_orm(string_value = "active")]
    Active,

    #[sea_orm(string_value = "completed")]
    Completed,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::group::Entity",
        from = "Column::GroupId",
        to = "super::group::Column::Id"
    )]
    Group,
    #[sea_orm(
        belongs_to = "super::group_member::Entity",
        from = "Column::OpenedBy",
        to = "super::group_member::Column::Id"
    )]
    Opener,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    Records,
}

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Records.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// `opened_at + window` for self sessions, `None` for manual ones.
    pub fn compute_expiry(
        kind: SessionKind,
        opened_at: DateTime<Utc>,
        window_minutes: i32,
    ) -> Option<DateTime<Utc>> {
        match kind {
            SessionKind::SelfMarked => Some(opened_at + Duration::minutes(i64::from(window_minutes))),
            SessionKind::Manual => None,
        }
    }

    /// Inserts a new active session.
    ///
    /// The partial unique index on `(group_id) WHERE status = 'active'` rejects a
    /// second active session; callers detect that with [`crate::is_unique_violation`].
    pub async fn open<C: ConnectionTrait>(
        db: &C,
        group_id: i64,
        opened_by: i64,
        kind: SessionKind,
        now: DateTime<Utc>,
        window_minutes: i32,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            group_id: Set(group_id),
            opened_by: Set(opened_by),
            date: Set(now.date_naive()),
            kind: Set(kind),
            status: Set(SessionStatus::Active),
            opened_at: Set(now),
            expires_at: Set(Self::compute_expiry(kind, now, window_minutes)),
            closed_at: Set(None),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    pub async fn find<C: ConnectionTrait>(db: &C, session_id: i64) -> Result<Option<Model>, DbErr> {
        Entity::find_by_id(session_id).one(db).await
    }

    pub async fn active_for_group<C: ConnectionTrait>(
        db: &C,
        group_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::Status.eq(SessionStatus::Active))
            .one(db)
            .await
    }

    /// Completed sessions of a group, most recent first.
    pub async fn completed_for_group<C: ConnectionTrait>(
        db: &C,
        group_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::Status.eq(SessionStatus::Completed))
            .order_by_desc(Column::OpenedAt)
            .order_by_desc(Column::Id)
            .all(db)
            .await
    }

    /// Touches the row only while it is still active.
    ///
    /// Used as the first write of a transaction that must not proceed once the
    /// session is completed; on SQLite it also takes the write lock, serialising
    /// against concurrent closes and conditional record inserts.
    pub async fn claim_if_active<C: ConnectionTrait>(
        db: &C,
        session_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(session_id))
            .filter(Column::Status.eq(SessionStatus::Active))
            .exec(db)
            .await?;
        Ok(res.rows_affected == 1)
    }

    /// The one-way `active -> completed` transition. Returns false if the
    /// session was not active.
    pub async fn mark_completed<C: ConnectionTrait>(
        db: &C,
        session_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let res = Entity::update_many()
            .col_expr(Column::Status, Expr::value(SessionStatus::Completed))
            .col_expr(Column::ClosedAt, Expr::value(Some(now)))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(session_id))
            .filter(Column::Status.eq(SessionStatus::Active))
            .exec(db)
            .await?;
        Ok(res.rows_affected == 1)
    }
}
