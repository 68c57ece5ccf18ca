// src/models/attempt.rs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Outcome of one completed quiz run, handed over by the quiz session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AttemptResult {
    pub user_id: i64,
    pub level_id: i64,

    #[validate(range(min = 0, message = "Elapsed time cannot be negative."))]
    pub elapsed_seconds: i32,

    #[validate(range(min = 0, message = "Correct answer count cannot be negative."))]
    pub correct_answers: i32,

    #[validate(range(min = 0, message = "Incorrect answer count cannot be negative."))]
    pub incorrect_answers: i32,
}

/// Represents the 'quiz_attempts' table in the database.
/// Append-only history; the ranking totals are summed from these rows.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: i64,
    pub level_id: i64,
    pub started_at: Option<DateTime<Utc>>,
    /// NULL while an attempt is still in progress.
    pub completed_at: Option<DateTime<Utc>>,
    pub time_elapsed_seconds: Option<i32>,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub stars_earned: i32,
}

/// A history row not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuizAttempt {
    pub user_id: i64,
    pub level_id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub time_elapsed_seconds: i32,
    pub correct_answers: i32,
    pub incorrect_answers: i32,
    pub stars_earned: i32,
}

impl NewQuizAttempt {
    /// History row for an attempt that finished at `now`.
    pub fn completed(result: &AttemptResult, stars: i32, now: DateTime<Utc>) -> Self {
        Self {
            user_id: result.user_id,
            level_id: result.level_id,
            started_at: now - Duration::seconds(i64::from(result.elapsed_seconds)),
            completed_at: now,
            time_elapsed_seconds: result.elapsed_seconds,
            correct_answers: result.correct_answers,
            incorrect_answers: result.incorrect_answers,
            stars_earned: stars,
        }
    }

    pub fn into_attempt(self, id: i64) -> QuizAttempt {
        QuizAttempt {
            id,
            user_id: self.user_id,
            level_id: self.level_id,
            started_at: Some(self.started_at),
            completed_at: Some(self.completed_at),
            time_elapsed_seconds: Some(self.time_elapsed_seconds),
            correct_answers: self.correct_answers,
            incorrect_answers: self.incorrect_answers,
            stars_earned: self.stars_earned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(elapsed: i32, correct: i32, incorrect: i32) -> AttemptResult {
        AttemptResult {
            user_id: 1,
            level_id: 1,
            elapsed_seconds: elapsed,
            correct_answers: correct,
            incorrect_answers: incorrect,
        }
    }

    #[test]
    fn test_validate_accepts_zero() {
        assert!(result(0, 0, 0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_fields() {
        let errors = result(-1, 3, 2).validate().unwrap_err();
        assert!(errors.field_errors().contains_key("elapsed_seconds"));

        let errors = result(10, -3, -2).validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("correct_answers"));
        assert!(fields.contains_key("incorrect_answers"));
    }

    #[test]
    fn test_completed_history_row() {
        let now = Utc::now();
        let row = NewQuizAttempt::completed(&result(120, 6, 6), 1, now);
        assert_eq!(row.completed_at, now);
        assert_eq!(row.started_at, now - Duration::seconds(120));
        assert_eq!(row.stars_earned, 1);

        let stored = row.into_attempt(9);
        assert_eq!(stored.id, 9);
        assert_eq!(stored.time_elapsed_seconds, Some(120));
        assert_eq!(stored.completed_at, Some(now));
    }
}
