pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

pub use sqlite::SqliteStore;

/// Telegram user a vocabulary or stats record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WordId(pub i64);

impl std::fmt::Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for WordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordRecord {
    pub id: WordId,
    pub owner_id: OwnerId,
    pub term: String,
    pub translation: String,
    pub times_learned: u32,
    pub added_at: NaiveDateTime,
}

/// Per-user answer counters. `tests_passed` counts answered questions,
/// not finished quizzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStats {
    pub owner_id: OwnerId,
    pub tests_passed: u32,
    pub correct_answers: u32,
}

impl UserStats {
    pub fn empty(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            tests_passed: 0,
            correct_answers: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("word {0} not found")]
    NotFound(WordId),

    #[error("failed to acquire the database lock: {0}")]
    Lock(String),

    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait WordStore: Send + Sync {
    async fn add_word(
        &self,
        owner: OwnerId,
        term: &str,
        translation: &str,
    ) -> StorageResult<WordRecord>;

    /// All words of `owner` in insertion order.
    async fn list_words(&self, owner: OwnerId) -> StorageResult<Vec<WordRecord>>;

    /// Up to `n` words of `owner`, sampled uniformly without replacement.
    async fn sample_random(&self, owner: OwnerId, n: usize) -> StorageResult<Vec<WordRecord>>;

    /// Fails with [`StorageError::NotFound`] if the word no longer exists.
    async fn increment_learned(&self, word: WordId) -> StorageResult<()>;
}

#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Zeroed counters when the user has never answered.
    async fn get_stats(&self, owner: OwnerId) -> StorageResult<UserStats>;

    async fn record_answer(&self, owner: OwnerId, was_correct: bool) -> StorageResult<()>;
}
