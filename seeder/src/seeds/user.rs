use crate::seed::Seeder;
use db::models::user::Model;
use fake::{Fake, faker::internet::en::SafeEmail};
use sea_orm::DatabaseConnection;
use services::AppError;

pub const TEACHER_USERNAME: &str = "t00000001";
const STUDENTS: usize = 12;

pub struct UserSeeder;

#[async_trait::async_trait]
impl Seeder for UserSeeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), AppError> {
        if Model::find_by_username(db, TEACHER_USERNAME).await?.is_none() {
            Model::create(db, TEACHER_USERNAME, "teacher@example.com").await?;
        }

        for _ in 0..STUDENTS {
            let username = format!("u{:08}", fastrand::u32(..100_000_000));
            let email: String = SafeEmail().fake();
            // random names may collide with an earlier run
            let _ = Model::create(db, &username, &email).await;
        }
        Ok(())
    }
}
