// src/models/ranking.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    config::{POINTS_PER_COMPLETED_LEVEL, POINTS_PER_STAR},
    models::{attempt::QuizAttempt, progress::ProgressRecord},
};

/// Represents the 'rankings' table in the database.
/// One row per user, rebuilt from scratch after every attempt.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct RankingRecord {
    pub user_id: i64,
    pub score: i64,
    pub completed_levels: i64,
    pub correct_answers: i64,
    pub incorrect_answers: i64,
    /// Mean elapsed time over completed attempts, whole seconds.
    pub average_time_seconds: Option<i32>,
    pub last_updated: DateTime<Utc>,
}

impl RankingRecord {
    /// Recomputes a user's ranking from their full progress and attempt history.
    ///
    /// * `score` = completed levels * 50 + total stars * 10.
    /// * Answer totals sum every attempt, finished or not.
    /// * The average time only looks at attempts with a completion timestamp.
    pub fn recompute(
        user_id: i64,
        progress: &[ProgressRecord],
        attempts: &[QuizAttempt],
        now: DateTime<Utc>,
    ) -> Self {
        let progress: Vec<&ProgressRecord> =
            progress.iter().filter(|p| p.user_id == user_id).collect();
        let attempts: Vec<&QuizAttempt> =
            attempts.iter().filter(|a| a.user_id == user_id).collect();

        let completed_levels = progress.iter().filter(|p| p.is_completed).count() as i64;
        let total_stars: i64 = progress.iter().map(|p| i64::from(p.stars)).sum();
        let score = completed_levels * POINTS_PER_COMPLETED_LEVEL + total_stars * POINTS_PER_STAR;

        let correct_answers: i64 = attempts.iter().map(|a| i64::from(a.correct_answers)).sum();
        let incorrect_answers: i64 = attempts.iter().map(|a| i64::from(a.incorrect_answers)).sum();

        // AVG skips rows without an elapsed time, like the SQL aggregate.
        let times: Vec<i64> = attempts
            .iter()
            .filter(|a| a.completed_at.is_some())
            .filter_map(|a| a.time_elapsed_seconds.map(i64::from))
            .collect();
        let average_time_seconds = average_seconds(&times);

        Self {
            user_id,
            score,
            completed_levels,
            correct_answers,
            incorrect_answers,
            average_time_seconds,
            last_updated: now,
        }
    }
}

/// Mean rounded half away from zero, as PostgreSQL rounds NUMERIC into INT.
fn average_seconds(times: &[i64]) -> Option<i32> {
    if times.is_empty() {
        return None;
    }
    let sum: i64 = times.iter().sum();
    let mean = sum as f64 / times.len() as f64;
    Some(mean.round() as i32)
}

/// Aggregated struct for displaying the leaderboard.
/// Represents a row joined from `rankings` and `users`.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub name: String,
    pub church: Option<String>,
    pub score: i64,
    pub completed_levels: i64,
    pub correct_answers: i64,
    pub incorrect_answers: i64,
    pub average_time_seconds: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(user_id: i64, level_id: i64, completed: bool, stars: i32) -> ProgressRecord {
        ProgressRecord {
            user_id,
            level_id,
            is_completed: completed,
            stars,
            best_time_seconds: Some(60),
            last_played: None,
        }
    }

    fn attempt(id: i64, user_id: i64, elapsed: i32, correct: i32, incorrect: i32, done: bool) -> QuizAttempt {
        QuizAttempt {
            id,
            user_id,
            level_id: 1,
            started_at: None,
            completed_at: if done { Some(Utc::now()) } else { None },
            time_elapsed_seconds: Some(elapsed),
            correct_answers: correct,
            incorrect_answers: incorrect,
            stars_earned: 0,
        }
    }

    #[test]
    fn test_single_level_score() {
        let now = Utc::now();
        let ranking = RankingRecord::recompute(
            1,
            &[progress(1, 1, true, 1)],
            &[attempt(1, 1, 120, 6, 6, true)],
            now,
        );
        assert_eq!(ranking.score, 60);
        assert_eq!(ranking.completed_levels, 1);
        assert_eq!(ranking.correct_answers, 6);
        assert_eq!(ranking.incorrect_answers, 6);
        assert_eq!(ranking.average_time_seconds, Some(120));
        assert_eq!(ranking.last_updated, now);
    }

    #[test]
    fn test_incomplete_attempts_count_answers_but_not_time() {
        let ranking = RankingRecord::recompute(
            1,
            &[progress(1, 1, true, 3), progress(1, 2, true, 2)],
            &[
                attempt(1, 1, 100, 11, 1, true),
                attempt(2, 1, 50, 8, 4, true),
                attempt(3, 1, 999, 2, 0, false),
            ],
            Utc::now(),
        );
        // 2 * 50 + 5 * 10
        assert_eq!(ranking.score, 150);
        assert_eq!(ranking.correct_answers, 21);
        assert_eq!(ranking.incorrect_answers, 5);
        assert_eq!(ranking.average_time_seconds, Some(75));
    }

    #[test]
    fn test_uncompleted_progress_only_adds_stars() {
        let ranking = RankingRecord::recompute(
            1,
            &[progress(1, 1, true, 2), progress(1, 2, false, 1)],
            &[],
            Utc::now(),
        );
        assert_eq!(ranking.completed_levels, 1);
        assert_eq!(ranking.score, 50 + 30);
        assert_eq!(ranking.correct_answers, 0);
        assert_eq!(ranking.average_time_seconds, None);
    }

    #[test]
    fn test_ignores_other_users_rows() {
        let ranking = RankingRecord::recompute(
            1,
            &[progress(1, 1, true, 1), progress(2, 1, true, 3)],
            &[attempt(1, 1, 30, 1, 0, true), attempt(2, 2, 10, 12, 0, true)],
            Utc::now(),
        );
        assert_eq!(ranking.score, 60);
        assert_eq!(ranking.correct_answers, 1);
        assert_eq!(ranking.average_time_seconds, Some(30));
    }

    #[test]
    fn test_average_rounds_half_away_from_zero() {
        assert_eq!(average_seconds(&[10, 11]), Some(11));
        assert_eq!(average_seconds(&[10, 10, 11]), Some(10));
        assert_eq!(average_seconds(&[]), None);
    }
}
