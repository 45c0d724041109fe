use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Membership of a profile in a group. `id` is the member id used throughout
/// attendance (`student_id`, `marked_by`, `opened_by`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "group_members")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub group_id: i64,
    /// Profile (`users.id`).
    pub profile_id: i64,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Display, EnumString,
    Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MemberRole {
    #[sea_orm(string_value = "teacher")]
    Teacher,

    #[sea_orm(string_value = "student")]
    Student,
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
        belongs_to = "super::user::Entity",
        from = "Column::ProfileId",
        to = "super::user::Column::Id"
    )]
    Profile,
}

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Group.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_student(&self) -> bool {
        self.role == MemberRole::Student
    }

    pub fn is_teacher(&self) -> bool {
        self.role == MemberRole::Teacher
    }

    pub async fn add<C: ConnectionTrait>(
        db: &C,
        group_id: i64,
        profile_id: i64,
        role: MemberRole,
    ) -> Result<Model, DbErr> {
        ActiveModel {
            group_id: Set(group_id),
            profile_id: Set(profile_id),
            role: Set(role),
            joined_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Membership of `profile_id` in `group_id`, if any.
    pub async fn find_in_group<C: ConnectionTrait>(
        db: &C,
        group_id: i64,
        profile_id: i64,
    ) -> Result<Option<Model>, DbErr> {
        Entity::find()
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::ProfileId.eq(profile_id))
            .one(db)
            .await
    }

    /// Current student members of a group, oldest membership first.
    pub async fn students_in_group<C: ConnectionTrait>(
        db: &C,
        group_id: i64,
    ) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::GroupId.eq(group_id))
            .filter(Column::Role.eq(MemberRole::Student))
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
