use colored::*;
use sea_orm::DatabaseConnection;
use services::AppError;
use std::io::{self, Write};
use std::time::Instant;

const STATUS_COLUMN: usize = 80;

#[async_trait::async_trait]
pub trait Seeder {
    async fn seed(&self, db: &DatabaseConnection) -> Result<(), AppError>;
}

/// Runs one seeder with a `Seeding X ....... done (12ms)` status line.
/// Exits the process on failure.
pub async fn run_seeder<S: Seeder + ?Sized>(seeder: &S, name: &str, db: &DatabaseConnection) {
    let base_msg = format!("Seeding {}", name.bold());
    let dots = ".".repeat(STATUS_COLUMN.saturating_sub(base_msg.len()));
    print!("{}{} ", base_msg, dots);
    io::stdout().flush().ok();

    let start = Instant::now();
    match seeder.seed(db).await {
        Ok(()) => {
            let time_str = format!("({:.2?})", start.elapsed()).dimmed();
            println!("{} {}", "done".green(), time_str);
        }
        Err(e) => {
            println!("{}", "failed".red());
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
