// src/store/memory.rs

//! In-process store used by tests and by embedders that do not need PostgreSQL.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc,
        atomic::{AtomicI64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as UserLock, OwnedMutexGuard};
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

#[derive(Debug, Clone)]
struct MemoryUser {
    name: String,
    church: Option<String>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, MemoryUser>,
    levels: BTreeMap<i64, Level>,
    progress: BTreeMap<(i64, i64), ProgressRecord>,
    attempts: Vec<QuizAttempt>,
    rankings: BTreeMap<i64, RankingRecord>,
}

#[derive(Default)]
struct Shared {
    tables: RwLock<Tables>,
    user_locks: Mutex<HashMap<i64, Arc<UserLock<()>>>>,
    next_user_id: AtomicI64,
    next_level_id: AtomicI64,
    next_attempt_id: AtomicI64,
    pending_conflicts: AtomicUsize,
}

impl Shared {
    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        f(&self.tables.read())
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        f(&mut self.tables.write())
    }

    fn user_lock(&self, user_id: i64) -> Arc<UserLock<()>> {
        self.user_locks.lock().entry(user_id).or_default().clone()
    }

    /// Drops the user's lock entry once nobody holds or waits on it.
    /// Clones only happen under the map mutex, so a count of 1 is final.
    fn release_user_lock(&self, user_id: i64) {
        let mut locks = self.user_locks.lock();
        if locks
            .get(&user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&user_id);
        }
    }
}

/// Owned per-user lock that prunes its map entry on release.
struct UserGuard {
    shared: Arc<Shared>,
    user_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        // The guard keeps its own reference to the mutex; release it first.
        drop(self.guard.take());
        self.shared.release_user_lock(self.user_id);
    }
}

/// Cheaply cloneable handle; clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a player and returns the new user id.
    pub fn insert_user(&self, name: &str, church: Option<&str>) -> i64 {
        let id = self.shared.next_user_id.fetch_add(1, Ordering::SeqCst) + 1;
        let user = MemoryUser {
            name: name.to_string(),
            church: church.map(str::to_string),
        };
        self.shared.write(|t| t.users.insert(id, user));
        id
    }

    pub fn insert_level(&self, level: &NewLevel) -> Result<Level, AppError> {
        level.validate()?;

        let id = self.shared.next_level_id.fetch_add(1, Ordering::SeqCst) + 1;
        let level = Level {
            id,
            name: level.name.clone(),
            description: level.description.clone(),
            order_number: level.order_number,
            questions_count: level.questions_count,
            is_active: true,
        };
        self.shared.write(|t| t.levels.insert(id, level.clone()));
        Ok(level)
    }

    /// Makes the next `count` commits fail with `AppError::Conflict`
    /// without applying anything, as a lost serialization race would.
    pub fn fail_next_commits(&self, count: usize) {
        self.shared.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Committed attempt history of one user, oldest first.
    pub fn attempts_for(&self, user_id: i64) -> Vec<QuizAttempt> {
        self.shared.read(|t| {
            t.attempts
                .iter()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    pub fn find_progress(&self, user_id: i64, level_id: i64) -> Option<ProgressRecord> {
        self.shared
            .read(|t| t.progress.get(&(user_id, level_id)).cloned())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self, user_id: i64) -> Result<MemoryTx, AppError> {
        let guard = self.shared.user_lock(user_id).lock_owned().await;

        Ok(MemoryTx {
            shared: Arc::clone(&self.shared),
            _guard: UserGuard {
                shared: Arc::clone(&self.shared),
                user_id,
                guard: Some(guard),
            },
            progress: BTreeMap::new(),
            attempts: Vec::new(),
            ranking: None,
        })
    }

    async fn leaderboard(&self, limit: i64) -> Result<Vec<LeaderboardEntry>, AppError> {
        let mut entries: Vec<LeaderboardEntry> = self.shared.read(|t| {
            t.rankings
                .values()
                .filter_map(|r| {
                    let user = t.users.get(&r.user_id)?;
                    Some(LeaderboardEntry {
                        user_id: r.user_id,
                        name: user.name.clone(),
                        church: user.church.clone(),
                        score: r.score,
                        completed_levels: r.completed_levels,
                        correct_answers: r.correct_answers,
                        incorrect_answers: r.incorrect_answers,
                        average_time_seconds: r.average_time_seconds,
                    })
                })
                .collect()
        });

        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.user_id.cmp(&b.user_id)));
        entries.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(entries)
    }

    async fn progress_report(&self, user_id: i64) -> Result<Vec<LevelProgress>, AppError> {
        let mut rows: Vec<LevelProgress> = self.shared.read(|t| {
            t.progress
                .values()
                .filter(|p| p.user_id == user_id)
                .filter_map(|p| {
                    let level = t.levels.get(&p.level_id)?;
                    let (correct, incorrect) = t
                        .attempts
                        .iter()
                        .filter(|a| a.user_id == user_id && a.level_id == p.level_id)
                        .fold((0i64, 0i64), |(c, i), a| {
                            (c + i64::from(a.correct_answers), i + i64::from(a.incorrect_answers))
                        });
                    Some(LevelProgress {
                        level_id: level.id,
                        level_name: level.name.clone(),
                        order_number: level.order_number,
                        is_completed: p.is_completed,
                        stars: p.stars,
                        best_time_seconds: p.best_time_seconds,
                        last_played: p.last_played,
                        correct_answers: correct,
                        incorrect_answers: incorrect,
                    })
                })
                .collect()
        });

        rows.sort_by_key(|r| (r.order_number, r.level_id));
        Ok(rows)
    }

    async fn find_ranking(&self, user_id: i64) -> Result<Option<RankingRecord>, AppError> {
        Ok(self.shared.read(|t| t.rankings.get(&user_id).cloned()))
    }
}

/// Holds the user's lock until dropped; writes are staged and applied on commit.
pub struct MemoryTx {
    shared: Arc<Shared>,
    _guard: UserGuard,
    progress: BTreeMap<(i64, i64), ProgressRecord>,
    attempts: Vec<QuizAttempt>,
    ranking: Option<RankingRecord>,
}

#[async_trait]
impl ProgressTx for MemoryTx {
    async fn find_level(&mut self, level_id: i64) -> Result<Option<Level>, AppError> {
        Ok(self.shared.read(|t| t.levels.get(&level_id).cloned()))
    }

    async fn find_progress(
        &mut self,
        user_id: i64,
        level_id: i64,
    ) -> Result<Option<ProgressRecord>, AppError> {
        if let Some(staged) = self.progress.get(&(user_id, level_id)) {
            return Ok(Some(staged.clone()));
        }
        Ok(self
            .shared
            .read(|t| t.progress.get(&(user_id, level_id)).cloned()))
    }

    async fn upsert_progress(&mut self, record: &ProgressRecord) -> Result<ProgressRecord, AppError> {
        self.progress
            .insert((record.user_id, record.level_id), record.clone());
        Ok(record.clone())
    }

    async fn insert_attempt(&mut self, attempt: &NewQuizAttempt) -> Result<QuizAttempt, AppError> {
        // Ids are never reused, even when the transaction is dropped.
        let id = self.shared.next_attempt_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = attempt.clone().into_attempt(id);
        self.attempts.push(stored.clone());
        Ok(stored)
    }

    async fn user_progress(&mut self, user_id: i64) -> Result<Vec<ProgressRecord>, AppError> {
        let mut rows: BTreeMap<(i64, i64), ProgressRecord> = self.shared.read(|t| {
            t.progress
                .iter()
                .filter(|(key, _)| key.0 == user_id)
                .map(|(key, record)| (*key, record.clone()))
                .collect()
        });
        for (key, record) in self.progress.iter().filter(|(key, _)| key.0 == user_id) {
            rows.insert(*key, record.clone());
        }
        Ok(rows.into_values().collect())
    }

    async fn user_attempts(&mut self, user_id: i64) -> Result<Vec<QuizAttempt>, AppError> {
        let mut rows: Vec<QuizAttempt> = self.shared.read(|t| {
            t.attempts
                .iter()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect()
        });
        rows.extend(self.attempts.iter().filter(|a| a.user_id == user_id).cloned());
        Ok(rows)
    }

    async fn upsert_ranking(&mut self, ranking: &RankingRecord) -> Result<RankingRecord, AppError> {
        self.ranking = Some(ranking.clone());
        Ok(ranking.clone())
    }

    async fn commit(self) -> Result<(), AppError> {
        let conflicted = self
            .shared
            .pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            return Err(AppError::Conflict(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }

        let MemoryTx {
            shared,
            _guard,
            progress,
            attempts,
            ranking,
        } = self;

        shared.write(|t| {
            t.progress.extend(progress);
            t.attempts.extend(attempts);
            if let Some(ranking) = ranking {
                t.rankings.insert(ranking.user_id, ranking);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn test_dropped_transaction_writes_nothing() {
        let store = MemoryStore::new();
        let level = store
            .insert_level(&NewLevel::new("Rute", "Perguntas sobre o livro de Rute", 8))
            .unwrap();

        {
            let mut tx = store.begin(1).await.unwrap();
            let record = ProgressRecord::first_attempt(1, level.id, 2, 40, Utc::now());
            tx.upsert_progress(&record).await.unwrap();
            assert_eq!(tx.find_progress(1, level.id).await.unwrap(), Some(record));
        }

        assert!(store.find_progress(1, level.id).is_none());
        // The lock was released with the dropped transaction.
        let tx = store.begin(1).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_conflict_discards_writes() {
        let store = MemoryStore::new();
        store.fail_next_commits(1);

        let mut tx = store.begin(5).await.unwrap();
        let ranking = RankingRecord::recompute(5, &[], &[], Utc::now());
        tx.upsert_ranking(&ranking).await.unwrap();
        let err = tx.commit().await.unwrap_err();
        assert!(err.is_conflict());
        assert!(store.find_ranking(5).await.unwrap().is_none());

        let mut tx = store.begin(5).await.unwrap();
        tx.upsert_ranking(&ranking).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.find_ranking(5).await.unwrap(), Some(ranking));
    }

    #[tokio::test]
    async fn test_leaderboard_skips_unknown_users_and_orders_ties() {
        let store = MemoryStore::new();
        let ana = store.insert_user("Ana", Some("Central"));
        let bia = store.insert_user("Bia", None);

        for (user_id, score) in [(bia, 60), (ana, 60), (99, 500)] {
            let mut tx = store.begin(user_id).await.unwrap();
            let mut ranking = RankingRecord::recompute(user_id, &[], &[], Utc::now());
            ranking.score = score;
            tx.upsert_ranking(&ranking).await.unwrap();
            tx.commit().await.unwrap();
        }

        let board = store.leaderboard(10).await.unwrap();
        let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Bia"]);
        assert_eq!(board[0].church.as_deref(), Some("Central"));

        assert_eq!(store.leaderboard(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_transaction_blocks_only_its_user() {
        let store = MemoryStore::new();
        let held = store.begin(1).await.unwrap();

        let other = tokio::time::timeout(Duration::from_millis(500), store.begin(2))
            .await
            .expect("another user's begin must not wait");
        other.unwrap().commit().await.unwrap();

        let same = tokio::time::timeout(Duration::from_millis(50), store.begin(1)).await;
        assert!(same.is_err(), "same user must wait for the open transaction");

        held.commit().await.unwrap();
        let again = tokio::time::timeout(Duration::from_millis(500), store.begin(1))
            .await
            .expect("lock is free after commit");
        drop(again);
    }

    #[tokio::test]
    async fn test_user_lock_entries_are_pruned() {
        let store = MemoryStore::new();

        for user_id in 1..=50 {
            let tx = store.begin(user_id).await.unwrap();
            if user_id % 2 == 0 {
                tx.commit().await.unwrap();
            }
        }

        assert!(store.shared.user_locks.lock().is_empty());

        let held = store.begin(7).await.unwrap();
        assert_eq!(store.shared.user_locks.lock().len(), 1);
        drop(held);
        assert!(store.shared.user_locks.lock().is_empty());
    }

    #[test]
    fn test_insert_level_validates() {
        let store = MemoryStore::new();

        let err = store
            .insert_level(&NewLevel::new("", "Sem nome", 1))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let err = store
            .insert_level(&NewLevel::new("Josué", "Perguntas", 6).with_questions_count(-1))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));

        let level = store
            .insert_level(&NewLevel::new("Josué", "Perguntas", 6))
            .unwrap();
        assert_eq!(level.id, 1);
    }
}
