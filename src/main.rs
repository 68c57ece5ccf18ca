// src/main.rs

use std::time::Duration;

use quiz_progress::config::Config;
use quiz_progress::error::AppError;
use quiz_progress::seed::seed_reference_data;
use quiz_progress::services::leaderboard::top_players;
use quiz_progress::store::PgStore;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CONNECT_RETRIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration from environment (and .env, if present)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily(&config.log_dir, "quiz-progress.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    tracing::info!("Setting up quiz database...");

    let pool = connect_with_retry(&config).await?;
    tracing::info!("Database connected...");

    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    if config.seed_data {
        seed_reference_data(&pool).await?;
    }

    let store = PgStore::new(pool);
    let leaderboard = top_players(&store, None).await?;
    if leaderboard.is_empty() {
        tracing::info!("The rankings table is empty; it fills up as users play.");
        tracing::info!("The first player to finish a level becomes #1 in the rankings.");
    } else {
        match serde_json::to_string(&leaderboard) {
            Ok(json) => tracing::info!(top = %json, "Current leaderboard"),
            Err(e) => tracing::warn!("Failed to serialize leaderboard: {}", e),
        }
    }

    tracing::info!("Database setup completed successfully!");
    Ok(())
}

async fn connect_with_retry(config: &Config) -> Result<PgPool, AppError> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > CONNECT_RETRIES {
                    tracing::error!(
                        "Failed to connect to database after {} retries: {}",
                        CONNECT_RETRIES,
                        e
                    );
                    return Err(e.into());
                }
                tracing::warn!(
                    "Database not ready, retrying in 2s... (Attempt {})",
                    retry_count
                );
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}
