//! Groups: the roster boundary for attendance, with per-group attendance settings.

use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set};
use serde::{Deserialize, Serialize};

use super::group_member::{self, MemberRole};

const JOIN_CODE_LEN: usize = 8;
// No 0/O or 1/I, codes are read aloud in class.
const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const JOIN_CODE_ATTEMPTS: usize = 5;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    /// Profile (`users.id`) that owns the group and controls its sessions.
    pub owner_id: i64,
    pub allow_self_attendance: bool,
    pub attendance_window_minutes: i32,
    pub penalty_threshold: i32,
    pub join_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The attendance-related settings block of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSettings {
    pub allow_self_attendance: bool,
    pub attendance_window_minutes: i32,
    pub penalty_threshold: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,
    #[sea_orm(has_many = "super::group_member::Entity")]
    Members,
    #[sea_orm(has_many = "super::attendance_session::Entity")]
    Sessions,
}

impl Related<super::group_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::attendance_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn generate_join_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_CHARSET[rng.gen_range(0..JOIN_CODE_CHARSET.len())] as char)
        .collect()
}

impl Model {
    pub fn settings(&self) -> GroupSettings {
        GroupSettings {
            allow_self_attendance: self.allow_self_attendance,
            attendance_window_minutes: self.attendance_window_minutes,
            penalty_threshold: self.penalty_threshold,
        }
    }

    /// Inserts a group with a fresh join code, retrying on the rare code collision.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        name: &str,
        owner_id: i64,
        settings: GroupSettings,
    ) -> Result<Model, DbErr> {
        let mut last_err = None;
        for _ in 0..JOIN_CODE_ATTEMPTS {
            let now = Utc::now();
            let active = ActiveModel {
                name: Set(name.to_owned()),
                owner_id: Set(owner_id),
                allow_self_attendance: Set(settings.allow_self_attendance),
                attendance_window_minutes: Set(settings.attendance_window_minutes),
                penalty_threshold: Set(settings.penalty_threshold),
                join_code: Set(generate_join_code()),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            match active.insert(db).await {
                Ok(group) => return Ok(group),
                Err(e) if crate::is_unique_violation(&e) => {
                    tracing::debug!(name, "join code collision, regenerating");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| DbErr::Custom("could not allocate a join code".into())))
    }

    /// Creates the group and enrols its owner as a teacher member.
    ///
    /// Returns the group and the owner's membership row.
    pub async fn create_with_owner<C: ConnectionTrait>(
        db: &C,
        name: &str,
        owner_id: i64,
        settings: GroupSettings,
    ) -> Result<(Model, group_member::Model), DbErr> {
        let group = Self::create(db, name, owner_id, settings).await?;
        let owner = group_member::Model::add(db, group.id, owner_id, MemberRole::Teacher).await?;
        Ok((group, owner))
    }

    pub async fn update_settings<C: ConnectionTrait>(
        db: &C,
        group_id: i64,
        settings: GroupSettings,
    ) -> Result<Model, DbErr> {
        let group = Entity::find_by_id(group_id)
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("Group {group_id} not found")))?;

        let mut active: ActiveModel = group.into();
        active.allow_self_attendance = Set(settings.allow_self_attendance);
        active.attendance_window_minutes = Set(settings.attendance_window_minutes);
        active.penalty_threshold = Set(settings.penalty_threshold);
        active.updated_at = Set(Utc::now());
        active.update(db).await
    }
}
