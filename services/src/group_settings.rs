use db::models::group::{self, GroupSettings};
use sea_orm::{ConnectionTrait, EntityTrait};
use serde::{Deserialize, Serialize};
use util::config;
use validator::Validate;

use crate::actor::Actor;
use crate::error::{AppError, AppResult};
use crate::role_gate;

/// Incoming settings block, validated before it reaches the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct SettingsUpdate {
    pub allow_self_attendance: bool,

    #[validate(range(min = 1, max = 1440, message = "must be between 1 and 1440 minutes"))]
    pub attendance_window_minutes: i32,

    #[validate(range(min = 1, max = 100, message = "must be between 1 and 100"))]
    pub penalty_threshold: i32,
}

impl From<SettingsUpdate> for GroupSettings {
    fn from(u: SettingsUpdate) -> Self {
        GroupSettings {
            allow_self_attendance: u.allow_self_attendance,
            attendance_window_minutes: u.attendance_window_minutes,
            penalty_threshold: u.penalty_threshold,
        }
    }
}

/// Settings for a newly created group.
pub fn defaults() -> GroupSettings {
    GroupSettings {
        allow_self_attendance: true,
        attendance_window_minutes: config::default_attendance_window_minutes(),
        penalty_threshold: config::default_penalty_threshold(),
    }
}

pub async fn find_group<C: ConnectionTrait>(db: &C, group_id: i64) -> AppResult<group::Model> {
    group::Entity::find_by_id(group_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Group {group_id}")))
}

/// Creates a group owned by `owner_profile_id` with configured default settings.
pub async fn create_group<C: ConnectionTrait>(
    db: &C,
    name: &str,
    owner_profile_id: i64,
) -> AppResult<(group::Model, Actor)> {
    let (group, owner) =
        group::Model::create_with_owner(db, name, owner_profile_id, defaults()).await?;
    tracing::info!(group_id = group.id, owner = owner_profile_id, "group created");
    Ok((group, Actor::from(&owner)))
}

pub async fn update_settings<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    group_id: i64,
    update: SettingsUpdate,
) -> AppResult<group::Model> {
    let group = find_group(db, group_id).await?;
    if !role_gate::can_edit_settings(actor, &group) {
        return Err(AppError::forbidden("only the group owner can change settings"));
    }
    update.validate()?;

    let updated = group::Model::update_settings(db, group_id, update.into()).await?;
    tracing::info!(
        group_id,
        allow_self = updated.allow_self_attendance,
        window = updated.attendance_window_minutes,
        threshold = updated.penalty_threshold,
        "group settings updated"
    );
    Ok(updated)
}
