// src/services/progress.rs

use chrono::Utc;
use validator::Validate;

use crate::{
    config::{ONE_STAR_PERCENTAGE, THREE_STAR_PERCENTAGE, TWO_STAR_PERCENTAGE},
    error::AppError,
    models::{
        attempt::{AttemptResult, NewQuizAttempt},
        progress::ProgressRecord,
        ranking::RankingRecord,
    },
    store::{ProgressStore, ProgressTx},
};

/// Percentage of a level's questions answered correctly.
/// A level without questions counts as 0%.
pub fn completion_percentage(correct_answers: i32, questions_count: i32) -> f64 {
    if questions_count <= 0 {
        return 0.0;
    }
    (correct_answers as f64 / questions_count as f64) * 100.0
}

/// Maps a completion percentage to 0-3 stars, highest threshold first.
pub fn stars_for_percentage(percentage: f64) -> i32 {
    if percentage >= THREE_STAR_PERCENTAGE {
        3
    } else if percentage >= TWO_STAR_PERCENTAGE {
        2
    } else if percentage >= ONE_STAR_PERCENTAGE {
        1
    } else {
        0
    }
}

pub fn calculate_stars(correct_answers: i32, questions_count: i32) -> i32 {
    stars_for_percentage(completion_percentage(correct_answers, questions_count))
}

/// Records finished quiz attempts: best-ever progress per level plus the
/// user's ranking row, both written in one per-user transaction.
pub struct ProgressRecorder<S> {
    store: S,
}

impl<S: ProgressStore> ProgressRecorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Records one completed attempt.
    ///
    /// * Rejects negative time or answer counts before touching storage.
    /// * Fails with `NotFound` when the level does not exist; nothing is written.
    /// * Retries once when the store reports a conflict, then gives up with `Conflict`.
    ///
    /// Returns the user's progress on the level and their recomputed ranking.
    pub async fn record_attempt(
        &self,
        result: &AttemptResult,
    ) -> Result<(ProgressRecord, RankingRecord), AppError> {
        result.validate()?;

        match self.try_record(result).await {
            Err(err) if err.is_conflict() => {
                tracing::warn!(
                    user_id = result.user_id,
                    level_id = result.level_id,
                    "Conflict while recording attempt, retrying: {}",
                    err
                );
                self.try_record(result).await
            }
            other => other,
        }
    }

    async fn try_record(
        &self,
        result: &AttemptResult,
    ) -> Result<(ProgressRecord, RankingRecord), AppError> {
        let now = Utc::now();
        let mut tx = self.store.begin(result.user_id).await?;

        let level = tx
            .find_level(result.level_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Level {} not found", result.level_id)))?;

        let stars = calculate_stars(result.correct_answers, level.questions_count);

        let progress = match tx.find_progress(result.user_id, result.level_id).await? {
            Some(existing) => existing.merge_attempt(stars, result.elapsed_seconds, now),
            None => ProgressRecord::first_attempt(
                result.user_id,
                result.level_id,
                stars,
                result.elapsed_seconds,
                now,
            ),
        };
        let progress = tx.upsert_progress(&progress).await?;

        tx.insert_attempt(&NewQuizAttempt::completed(result, stars, now))
            .await?;

        let all_progress = tx.user_progress(result.user_id).await?;
        let attempts = tx.user_attempts(result.user_id).await?;
        let ranking = RankingRecord::recompute(result.user_id, &all_progress, &attempts, now);
        let ranking = tx.upsert_ranking(&ranking).await?;

        tx.commit().await?;

        tracing::info!(
            user_id = result.user_id,
            level_id = result.level_id,
            stars,
            best_stars = progress.stars,
            score = ranking.score,
            "Attempt recorded"
        );

        Ok((progress, ranking))
    }
}
