// src/lib.rs

pub mod config;
pub mod error;
pub mod models;
pub mod seed;
pub mod services;
pub mod store;

// Re-export specific items for convenience
pub use error::AppError;
pub use services::progress::ProgressRecorder;
pub use store::{MemoryStore, PgStore, ProgressStore, ProgressTx};
