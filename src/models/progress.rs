// src/models/progress.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'user_progress' table in the database.
/// Best-ever outcome of a user on one level; unique on (user_id, level_id).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: i64,
    pub level_id: i64,

    /// Sticky: once a level is completed it stays completed.
    pub is_completed: bool,

    /// Best star rating so far, 0 to 3. Never decreases.
    pub stars: i32,

    /// Fastest run so far. Never increases.
    pub best_time_seconds: Option<i32>,

    pub last_played: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// Progress row for a user's first attempt at a level.
    pub fn first_attempt(
        user_id: i64,
        level_id: i64,
        stars: i32,
        elapsed_seconds: i32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            level_id,
            is_completed: true,
            stars,
            best_time_seconds: Some(elapsed_seconds),
            last_played: Some(now),
        }
    }

    /// Folds a new attempt into the existing row, keeping the best values.
    pub fn merge_attempt(self, stars: i32, elapsed_seconds: i32, now: DateTime<Utc>) -> Self {
        let best_time_seconds = match self.best_time_seconds {
            Some(best) => Some(best.min(elapsed_seconds)),
            None => Some(elapsed_seconds),
        };

        Self {
            is_completed: true,
            stars: self.stars.max(stars),
            best_time_seconds,
            last_played: Some(now),
            ..self
        }
    }
}

/// Row of a user's progress report, joined with the level it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct LevelProgress {
    pub level_id: i64,
    pub level_name: String,
    pub order_number: i32,
    pub is_completed: bool,
    pub stars: i32,
    pub best_time_seconds: Option<i32>,
    pub last_played: Option<DateTime<Utc>>,
    /// Totals over this user's attempts on this level.
    pub correct_answers: i64,
    pub incorrect_answers: i64,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_first_attempt() {
        let now = Utc::now();
        let record = ProgressRecord::first_attempt(3, 1, 1, 120, now);
        assert!(record.is_completed);
        assert_eq!(record.stars, 1);
        assert_eq!(record.best_time_seconds, Some(120));
        assert_eq!(record.last_played, Some(now));
    }

    #[test]
    fn test_merge_keeps_best_values() {
        let first = Utc::now();
        let later = first + Duration::seconds(300);
        let record = ProgressRecord::first_attempt(3, 1, 3, 90, first);

        // Worse run: slower, fewer stars
        let merged = record.merge_attempt(1, 200, later);
        assert_eq!(merged.stars, 3);
        assert_eq!(merged.best_time_seconds, Some(90));
        assert_eq!(merged.last_played, Some(later));
        assert!(merged.is_completed);
    }

    #[test]
    fn test_merge_improves() {
        let now = Utc::now();
        let record = ProgressRecord::first_attempt(3, 1, 1, 120, now);
        let merged = record.merge_attempt(3, 90, now);
        assert_eq!(merged.stars, 3);
        assert_eq!(merged.best_time_seconds, Some(90));
    }

    #[test]
    fn test_merge_fills_missing_time_and_completion() {
        let now = Utc::now();
        let record = ProgressRecord {
            user_id: 3,
            level_id: 2,
            is_completed: false,
            stars: 0,
            best_time_seconds: None,
            last_played: None,
        };
        let merged = record.merge_attempt(0, 45, now);
        assert!(merged.is_completed);
        assert_eq!(merged.best_time_seconds, Some(45));
        assert_eq!(merged.user_id, 3);
        assert_eq!(merged.level_id, 2);
    }
}
