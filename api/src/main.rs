use api::app;
use migration::Migrator;
use sea_orm_migration::MigratorTrait;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tracing_appender::rolling;
use util::{config, state::AppState, ws::WebSocketManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _log_guard = init_logging(&config::log_file(), &config::log_level());

    let db = db::connect().await?;
    Migrator::up(&db, None).await?;

    let app_state = AppState::new(db, WebSocketManager::new());

    let cors = CorsLayer::very_permissive();
    let app = app(app_state).layer(cors);

    let addr: SocketAddr = format!("{}:{}", config::host(), config::port()).parse()?;
    tracing::info!(
        "Starting {} on http://{}",
        config::project_name(),
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn init_logging(log_file: &str, log_level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    use std::fs;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    fs::create_dir_all("logs").ok();

    let file_appender = rolling::daily("logs", log_file);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true);

    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| {
        EnvFilter::new("api=info,services=info,db=info,util=info")
    });

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if config::log_to_stdout() {
        registry.with(stdout_layer).init();
    } else {
        registry.init();
    }

    guard
}
