// src/config.rs

use std::env;

use dotenvy::dotenv;

use crate::error::AppError;

/// Star thresholds on the percentage of correct answers, highest first.
pub const THREE_STAR_PERCENTAGE: f64 = 90.0;
pub const TWO_STAR_PERCENTAGE: f64 = 70.0;
pub const ONE_STAR_PERCENTAGE: f64 = 50.0;

/// Ranking points.
pub const POINTS_PER_COMPLETED_LEVEL: i64 = 50;
pub const POINTS_PER_STAR: i64 = 10;

/// Question count a level gets when none is given.
pub const DEFAULT_QUESTIONS_COUNT: i32 = 12;

pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
pub const MAX_LEADERBOARD_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub max_connections: u32,
    pub log_dir: String,
    /// Insert the reference levels and achievements on startup.
    pub seed_data: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL must be set".to_string()))?;

        let rust_log = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                AppError::Config(format!("DATABASE_MAX_CONNECTIONS '{}': {}", raw, e))
            })?,
            None => 5,
        };

        let log_dir = lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string());

        let seed_data = match lookup("SEED_DATA").as_deref() {
            None => true,
            Some("1") | Some("true") | Some("yes") => true,
            Some("0") | Some("false") | Some("no") => false,
            Some(other) => {
                return Err(AppError::Config(format!("SEED_DATA '{}' is not a boolean", other)));
            }
        };

        Ok(Self {
            database_url,
            rust_log,
            max_connections,
            log_dir,
            seed_data,
        })
    }
}
