// src/store/mod.rs

//! Storage collaborator for the progress recorder.
//!
//! A store hands out transactions scoped to a single user. Everything the
//! recorder writes for one attempt goes through one `ProgressTx` and becomes
//! visible on `commit`; dropping the transaction discards it.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        attempt::{NewQuizAttempt, QuizAttempt},
        level::Level,
        progress::{LevelProgress, ProgressRecord},
        ranking::{LeaderboardEntry, RankingRecord},
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    type Tx: ProgressTx + 'static;

    /// Opens a transaction that is serialized against every other
    /// transaction for the same `user_id`.
    async fn begin(&self, user_id: i64) -> Result<Self::Tx, AppError>;

    /// Ranking rows joined with their users, best score first.
    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, AppError>;

    /// Per-level progress of one user, in level order.
    async fn progress_report(&self, user_id: i64) -> Result<Vec<LevelProgress>, AppError>;

    async fn find_ranking(&self, user_id: i64) -> Result<Option<RankingRecord>, AppError>;
}

#[async_trait]
pub trait ProgressTx: Send {
    async fn find_level(&mut self, level_id: i64) -> Result<Option<Level>, AppError>;

    async fn find_progress(
        &mut self,
        user_id: i64,
        level_id: i64,
    ) -> Result<Option<ProgressRecord>, AppError>;

    /// Inserts or overwrites the row keyed by (user_id, level_id).
    async fn upsert_progress(&mut self, record: &ProgressRecord) -> Result<ProgressRecord, AppError>;

    async fn insert_attempt(&mut self, attempt: &NewQuizAttempt) -> Result<QuizAttempt, AppError>;

    async fn user_progress(&mut self, user_id: i64) -> Result<Vec<ProgressRecord>, AppError>;

    async fn user_attempts(&mut self, user_id: i64) -> Result<Vec<QuizAttempt>, AppError>;

    /// Inserts or overwrites the single ranking row of a user.
    async fn upsert_ranking(&mut self, ranking: &RankingRecord) -> Result<RankingRecord, AppError>;

    async fn commit(self) -> Result<(), AppError>;
}
