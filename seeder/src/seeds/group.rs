use crate::seed::Seeder;
use crate::seeds::user::TEACHER_USERNAME;
use db::models::group_member::{self, MemberRole};
use db::models::user;
use sea_orm::{DatabaseConnection, EntityTrait};
use services::{AppError, group_settings};

pub struct GroupSeeder;

#[async_trait::async_trait]
impl Seeder for GroupSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), AppError> {
        let teacher = user::Model::find_by_username(db, TEACHER_USERNAME)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User {TEACHER_USERNAME}")))?;

        let (group, _) = group_settings::create_group(db, "Demo Group", teacher.id).await?;

        for u in user::Entity::find().all(db).await? {
            if u.id != teacher.id {
                group_member::Model::add(db, group.id, u.id, MemberRole::Student).await?;
            }
        }
        Ok(())
    }
}
