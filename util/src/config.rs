//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_duration_minutes: u64,
    pub default_attendance_window_minutes: i32,
    pub default_penalty_threshold: i32,
    pub reconciliation_fill_attempts: u32,
    pub ws_channel_capacity: usize,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Missing or unparsable values fall back to development defaults, so the
    /// engine can run against an in-memory database without any `.env` present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "roll-call".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "api=info,services=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "api.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "data/dev.db".into()),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into()),
            port: var_or("PORT", 3000),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "dev-secret".into()),
            jwt_duration_minutes: var_or("JWT_DURATION_MINUTES", 60),
            default_attendance_window_minutes: var_or("DEFAULT_ATTENDANCE_WINDOW_MINUTES", 15),
            default_penalty_threshold: var_or("DEFAULT_PENALTY_THRESHOLD", 3),
            reconciliation_fill_attempts: var_or("RECONCILIATION_FILL_ATTEMPTS", 3),
            ws_channel_capacity: var_or("WS_CHANNEL_CAPACITY", 100),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock is poisoned.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            if let Ok(mut guard) = lock.write() {
                *guard = AppConfig::from_env();
            }
        }
    }

    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_jwt_secret(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.jwt_secret = value.into());
    }

    pub fn set_default_attendance_window_minutes(value: i32) {
        AppConfig::set_field(|cfg| cfg.default_attendance_window_minutes = value);
    }

    pub fn set_default_penalty_threshold(value: i32) {
        AppConfig::set_field(|cfg| cfg.default_penalty_threshold = value);
    }

    pub fn set_reconciliation_fill_attempts(value: u32) {
        AppConfig::set_field(|cfg| cfg.reconciliation_fill_attempts = value);
    }
}

// --- Free accessors, read through the global instance ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

pub fn host() -> String {
    AppConfig::global().host.clone()
}

pub fn port() -> u16 {
    AppConfig::global().port
}

pub fn jwt_secret() -> String {
    AppConfig::global().jwt_secret.clone()
}

pub fn jwt_duration_minutes() -> u64 {
    AppConfig::global().jwt_duration_minutes
}

pub fn default_attendance_window_minutes() -> i32 {
    AppConfig::global().default_attendance_window_minutes
}

pub fn default_penalty_threshold() -> i32 {
    AppConfig::global().default_penalty_threshold
}

/// Number of passes the reconciliation fill makes over failing rows (at least one).
pub fn reconciliation_fill_attempts() -> u32 {
    AppConfig::global().reconciliation_fill_attempts.max(1)
}

pub fn ws_channel_capacity() -> usize {
    AppConfig::global().ws_channel_capacity.max(1)
}
