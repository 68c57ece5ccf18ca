// src/store/postgres.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{NewQuizAttempt, QuizAttempt},
        level::{Level, NewLevel},
        progress::{LevelProgress, ProgressRecord},
        ranking::{LeaderboardEntry, RankingRecord},
    },
    store::{ProgressStore, ProgressTx},
};

const PROGRESS_COLUMNS: &str =
    "user_id, level_id, is_completed, stars, best_time_seconds, last_played";

const ATTEMPT_COLUMNS: &str = "id, user_id, level_id, started_at, completed_at, \
     time_elapsed_seconds, correct_answers, incorrect_answers, stars_earned";

const RANKING_COLUMNS: &str = "user_id, score, completed_levels, correct_answers, \
     incorrect_answers, average_time_seconds, last_updated";

/// PostgreSQL-backed store over the tables created by `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn insert_level(&self, level: &NewLevel) -> Result<Level, AppError> {
        level.validate()?;

        let level = sqlx::query_as::<_, Level>(
            r#"
            INSERT INTO levels (name, description, order_number, questions_count)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, order_number, questions_count, is_active
            "#,
        )
        .bind(&level.name)
        .bind(&level.description)
        .bind(level.order_number)
        .bind(level.questions_count)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert level: {:?}", e);
            AppError::from(e)
        })?;

        Ok(level)
    }
}

#[async_trait]
impl ProgressStore for PgStore {
    type Tx = PgTx;

    /// Begins a transaction and takes the user's advisory lock.
    /// The lock is released by PostgreSQL on commit or rollback.
    async fn begin(&self, user_id: i64) -> Result<PgTx, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        Ok(PgTx { tx })
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, AppError> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT
                r.user_id,
                u.name,
                u.church,
                r.score,
                r.completed_levels,
                r.correct_answers,
                r.incorrect_answers,
                r.average_time_seconds
            FROM rankings r
            JOIN users u ON r.user_id = u.id
            ORDER BY r.score DESC, r.user_id ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch leaderboard: {:?}", e);
            AppError::from(e)
        })?;

        Ok(entries)
    }

    async fn progress_report(&self, user_id: i64) -> Result<Vec<LevelProgress>, AppError> {
        let rows = sqlx::query_as::<_, LevelProgress>(
            r#"
            SELECT
                l.id AS level_id,
                l.name AS level_name,
                l.order_number,
                up.is_completed,
                up.stars,
                up.best_time_seconds,
                up.last_played,
                COALESCE((SELECT SUM(qa.correct_answers) FROM quiz_attempts qa
                          WHERE qa.user_id = up.user_id AND qa.level_id = l.id), 0)::BIGINT AS correct_answers,
                COALESCE((SELECT SUM(qa.incorrect_answers) FROM quiz_attempts qa
                          WHERE qa.user_id = up.user_id AND qa.level_id = l.id), 0)::BIGINT AS incorrect_answers
            FROM user_progress up
            JOIN levels l ON up.level_id = l.id
            WHERE up.user_id = $1
            ORDER BY l.order_number, l.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch progress report: {:?}", e);
            AppError::from(e)
        })?;

        Ok(rows)
    }

    async fn find_ranking(&self, user_id: i64) -> Result<Option<RankingRecord>, AppError> {
        let ranking = sqlx::query_as::<_, RankingRecord>(&format!(
            "SELECT {RANKING_COLUMNS} FROM rankings WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ranking)
    }
}

pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ProgressTx for PgTx {
    async fn find_level(&mut self, level_id: i64) -> Result<Option<Level>, AppError> {
        let level = sqlx::query_as::<_, Level>(
            r#"
            SELECT id, name, description, order_number, questions_count, is_active
            FROM levels
            WHERE id = $1
            "#,
        )
        .bind(level_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(level)
    }

    async fn find_progress(
        &mut self,
        user_id: i64,
        level_id: i64,
    ) -> Result<Option<ProgressRecord>, AppError> {
        let record = sqlx::query_as::<_, ProgressRecord>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_id = $1 AND level_id = $2"
        ))
        .bind(user_id)
        .bind(level_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn upsert_progress(&mut self, record: &ProgressRecord) -> Result<ProgressRecord, AppError> {
        let saved = sqlx::query_as::<_, ProgressRecord>(&format!(
            r#"
            INSERT INTO user_progress ({PROGRESS_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, level_id) DO UPDATE SET
                is_completed = EXCLUDED.is_completed,
                stars = EXCLUDED.stars,
                best_time_seconds = EXCLUDED.best_time_seconds,
                last_played = EXCLUDED.last_played
            RETURNING {PROGRESS_COLUMNS}
            "#
        ))
        .bind(record.user_id)
        .bind(record.level_id)
        .bind(record.is_completed)
        .bind(record.stars)
        .bind(record.best_time_seconds)
        .bind(record.last_played)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert user progress: {:?}", e);
            AppError::from(e)
        })?;

        Ok(saved)
    }

    async fn insert_attempt(&mut self, attempt: &NewQuizAttempt) -> Result<QuizAttempt, AppError> {
        let saved = sqlx::query_as::<_, QuizAttempt>(&format!(
            r#"
            INSERT INTO quiz_attempts (
                user_id, level_id, started_at, completed_at,
                time_elapsed_seconds, correct_answers, incorrect_answers, stars_earned
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {ATTEMPT_COLUMNS}
            "#
        ))
        .bind(attempt.user_id)
        .bind(attempt.level_id)
        .bind(attempt.started_at)
        .bind(attempt.completed_at)
        .bind(attempt.time_elapsed_seconds)
        .bind(attempt.correct_answers)
        .bind(attempt.incorrect_answers)
        .bind(attempt.stars_earned)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert quiz attempt: {:?}", e);
            AppError::from(e)
        })?;

        Ok(saved)
    }

    async fn user_progress(&mut self, user_id: i64) -> Result<Vec<ProgressRecord>, AppError> {
        let rows = sqlx::query_as::<_, ProgressRecord>(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM user_progress WHERE user_id = $1 ORDER BY level_id"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    async fn user_attempts(&mut self, user_id: i64) -> Result<Vec<QuizAttempt>, AppError> {
        let rows = sqlx::query_as::<_, QuizAttempt>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quiz_attempts WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    async fn upsert_ranking(&mut self, ranking: &RankingRecord) -> Result<RankingRecord, AppError> {
        let saved = sqlx::query_as::<_, RankingRecord>(&format!(
            r#"
            INSERT INTO rankings ({RANKING_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (user_id) DO UPDATE SET
                score = EXCLUDED.score,
                completed_levels = EXCLUDED.completed_levels,
                correct_answers = EXCLUDED.correct_answers,
                incorrect_answers = EXCLUDED.incorrect_answers,
                average_time_seconds = EXCLUDED.average_time_seconds,
                last_updated = EXCLUDED.last_updated
            RETURNING {RANKING_COLUMNS}
            "#
        ))
        .bind(ranking.user_id)
        .bind(ranking.score)
        .bind(ranking.completed_levels)
        .bind(ranking.correct_answers)
        .bind(ranking.incorrect_answers)
        .bind(ranking.average_time_seconds)
        .bind(ranking.last_updated)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert ranking: {:?}", e);
            AppError::from(e)
        })?;

        Ok(saved)
    }

    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }
}
