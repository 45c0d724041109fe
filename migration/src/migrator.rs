use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202510010001_create_users::Migration),
            Box::new(migrations::m202510010002_create_groups::Migration),
            Box::new(migrations::m202510010003_create_group_members::Migration),
            Box::new(migrations::m202510010004_create_attendance::Migration),
        ]
    }
}
