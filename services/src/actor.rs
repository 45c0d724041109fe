use db::models::group_member::{self, MemberRole};
use sea_orm::ConnectionTrait;
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// The acting member: who is making a call, inside which group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub member_id: i64,
    pub profile_id: i64,
    pub group_id: i64,
    pub role: MemberRole,
}

impl From<&group_member::Model> for Actor {
    fn from(m: &group_member::Model) -> Self {
        Self {
            member_id: m.id,
            profile_id: m.profile_id,
            group_id: m.group_id,
            role: m.role,
        }
    }
}

impl Actor {
    pub fn is_teacher(&self) -> bool {
        self.role == MemberRole::Teacher
    }

    pub fn is_student(&self) -> bool {
        self.role == MemberRole::Student
    }

    /// Membership of an authenticated profile in `group_id`.
    pub async fn resolve<C: ConnectionTrait>(
        db: &C,
        group_id: i64,
        profile_id: i64,
    ) -> AppResult<Actor> {
        group_member::Model::find_in_group(db, group_id, profile_id)
            .await?
            .map(|m| Actor::from(&m))
            .ok_or_else(|| {
                AppError::not_found(format!("Membership of profile {profile_id} in group {group_id}"))
            })
    }

    pub async fn by_member_id<C: ConnectionTrait>(db: &C, member_id: i64) -> AppResult<Actor> {
        use sea_orm::EntityTrait;

        group_member::Entity::find_by_id(member_id)
            .one(db)
            .await?
            .map(|m| Actor::from(&m))
            .ok_or_else(|| AppError::not_found(format!("Member {member_id}")))
    }
}
