use colored::*;
use sea_orm_migration::prelude::*;
use std::io::{self, Write};
use std::time::Instant;

const STATUS_COLUMN: usize = 72;

/// Applies every migration in order, printing one status line per migration.
///
/// All migrations are written with `IF NOT EXISTS`, so re-running against an
/// existing database is harmless. Stops at the first failure.
pub async fn run_all_migrations(url: &str) -> Result<(), DbErr> {
    let db = sea_orm::Database::connect(url).await?;

    println!("Running migrations...");
    let schema_manager = SchemaManager::new(&db);

    for migration in <crate::Migrator as MigratorTrait>::migrations() {
        run_migration(&schema_manager, migration).await?;
    }
    Ok(())
}

async fn run_migration(
    schema_manager: &SchemaManager<'_>,
    migration: Box<dyn MigrationTrait>,
) -> Result<(), DbErr> {
    let name_str = format!("Applying {}", migration.name().bold());
    let dots = ".".repeat(STATUS_COLUMN.saturating_sub(name_str.len()));
    print!("{}{} ", name_str, dots);
    let _ = io::stdout().flush();

    let start = Instant::now();
    match migration.up(schema_manager).await {
        Ok(()) => {
            let time_str = format!("({:.2?})", start.elapsed()).dimmed();
            println!("{} {}", "done".green(), time_str);
            Ok(())
        }
        Err(e) => {
            println!("{}", "failed".red());
            Err(e)
        }
    }
}
