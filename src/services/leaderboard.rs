// src/services/leaderboard.rs

use crate::{
    config::{DEFAULT_LEADERBOARD_LIMIT, MAX_LEADERBOARD_LIMIT},
    error::AppError,
    models::{progress::LevelProgress, ranking::LeaderboardEntry},
    store::ProgressStore,
};

/// Retrieves the top players, best score first.
/// `limit` defaults to 10 and is clamped to 1..=100.
pub async fn top_players<S: ProgressStore>(
    store: &S,
    limit: Option<i64>,
) -> Result<Vec<LeaderboardEntry>, AppError> {
    let limit = clamp_limit(limit);
    store.leaderboard(limit).await
}

/// Lists where a player stands on every level they have played.
pub async fn progress_report<S: ProgressStore>(
    store: &S,
    user_id: i64,
) -> Result<Vec<LevelProgress>, AppError> {
    store.progress_report(user_id).await
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(-4)), 1);
        assert_eq!(clamp_limit(Some(25)), 25);
        assert_eq!(clamp_limit(Some(5000)), 100);
    }
}
