use crate::seed::{Seeder, run_seeder};
use crate::seeds::{attendance::AttendanceSeeder, group::GroupSeeder, user::UserSeeder};
use migration::Migrator;
use sea_orm_migration::MigratorTrait;

mod seed;
mod seeds;

#[tokio::main]
async fn main() {
    let db = match db::connect().await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("cannot connect to database: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = Migrator::up(&db, None).await {
        eprintln!("migrations failed: {e}");
        std::process::exit(1);
    }

    for (seeder, name) in [
        (Box::new(UserSeeder) as Box<dyn Seeder + Send + Sync>, "User"),
        (Box::new(GroupSeeder), "Group"),
        (Box::new(AttendanceSeeder), "Attendance"),
    ] {
        run_seeder(&*seeder, name, &db).await;
    }
}
