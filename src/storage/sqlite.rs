use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{
    OwnerId, StatsStore, StorageError, StorageResult, UserStats, WordId, WordRecord, WordStore,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS words (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    word TEXT NOT NULL,
    translation TEXT NOT NULL,
    times_learned INTEGER NOT NULL DEFAULT 0,
    added_date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_words_user ON words (user_id);

CREATE TABLE IF NOT EXISTS stats (
    user_id INTEGER PRIMARY KEY,
    tests_passed INTEGER NOT NULL DEFAULT 0,
    correct INTEGER NOT NULL DEFAULT 0
);
";

const WORD_COLUMNS: &str = "id, user_id, word, translation, times_learned, added_date";

/// Words and answer statistics kept in a single SQLite database.
///
/// Every query runs on tokio's blocking pool, so a slow query only holds up
/// the caller that is waiting for it.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, query: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StorageError::Lock(e.to_string()))?;
            query(&conn)
        })
        .await?
    }
}

fn word_from_row(row: &Row<'_>) -> rusqlite::Result<WordRecord> {
    Ok(WordRecord {
        id: WordId(row.get(0)?),
        owner_id: OwnerId(row.get(1)?),
        term: row.get(2)?,
        translation: row.get(3)?,
        times_learned: row.get(4)?,
        added_at: row.get(5)?,
    })
}

#[async_trait]
impl WordStore for SqliteStore {
    async fn add_word(
        &self,
        owner: OwnerId,
        term: &str,
        translation: &str,
    ) -> StorageResult<WordRecord> {
        let term = term.to_string();
        let translation = translation.to_string();
        self.run(move |conn| {
            let added_at = chrono::Local::now().naive_local();
            conn.execute(
                "INSERT INTO words (user_id, word, translation, added_date) VALUES (?1, ?2, ?3, ?4)",
                params![owner.0, term, translation, added_at],
            )?;

            Ok(WordRecord {
                id: WordId(conn.last_insert_rowid()),
                owner_id: owner,
                term,
                translation,
                times_learned: 0,
                added_at,
            })
        })
        .await
    }

    async fn list_words(&self, owner: OwnerId) -> StorageResult<Vec<WordRecord>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WORD_COLUMNS} FROM words WHERE user_id = ?1 ORDER BY id"
            ))?;
            let words = stmt
                .query_map(params![owner.0], word_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(words)
        })
        .await
    }

    async fn sample_random(&self, owner: OwnerId, n: usize) -> StorageResult<Vec<WordRecord>> {
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {WORD_COLUMNS} FROM words WHERE user_id = ?1 ORDER BY RANDOM() LIMIT ?2"
            ))?;
            let words = stmt
                .query_map(params![owner.0, n as i64], word_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(words)
        })
        .await
    }

    async fn increment_learned(&self, word: WordId) -> StorageResult<()> {
        self.run(move |conn| {
            let updated = conn.execute(
                "UPDATE words SET times_learned = times_learned + 1 WHERE id = ?1",
                params![word.0],
            )?;
            if updated == 0 {
                return Err(StorageError::NotFound(word));
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl StatsStore for SqliteStore {
    async fn get_stats(&self, owner: OwnerId) -> StorageResult<UserStats> {
        self.run(move |conn| {
            let stats = conn
                .query_row(
                    "SELECT tests_passed, correct FROM stats WHERE user_id = ?1",
                    params![owner.0],
                    |row| {
                        Ok(UserStats {
                            owner_id: owner,
                            tests_passed: row.get(0)?,
                            correct_answers: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(stats.unwrap_or_else(|| UserStats::empty(owner)))
        })
        .await
    }

    async fn record_answer(&self, owner: OwnerId, was_correct: bool) -> StorageResult<()> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO stats (user_id, tests_passed, correct) VALUES (?1, 1, ?2)
                 ON CONFLICT (user_id) DO UPDATE SET
                     tests_passed = tests_passed + 1,
                     correct = correct + excluded.correct",
                params![owner.0, u32::from(was_correct)],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    const ALICE: OwnerId = OwnerId(1);
    const BOB: OwnerId = OwnerId(2);

    #[tokio::test]
    async fn added_words_are_listed_per_owner() {
        let store = SqliteStore::open_in_memory().unwrap();
        let cat = store.add_word(ALICE, "cat", "gato").await.unwrap();
        store.add_word(ALICE, "dog", "perro").await.unwrap();
        store.add_word(BOB, "house", "casa").await.unwrap();

        let words = store.list_words(ALICE).await.unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], cat);
        assert_eq!(words[0].times_learned, 0);
        assert_eq!(words[1].term, "dog");
        assert!(words.iter().all(|w| w.owner_id == ALICE));
    }

    #[tokio::test]
    async fn sample_is_bounded_and_without_replacement() {
        let store = SqliteStore::open_in_memory().unwrap();
        for i in 0..8 {
            store
                .add_word(ALICE, &format!("w{i}"), &format!("t{i}"))
                .await
                .unwrap();
        }
        store.add_word(BOB, "other", "otro").await.unwrap();

        let sample = store.sample_random(ALICE, 5).await.unwrap();
        assert_eq!(sample.len(), 5);
        let mut ids: Vec<_> = sample.iter().map(|w| w.id.0).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
        assert!(sample.iter().all(|w| w.owner_id == ALICE));

        assert_eq!(store.sample_random(BOB, 5).await.unwrap().len(), 1);
        assert!(store.sample_random(OwnerId(99), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn increment_learned_reports_missing_words() {
        let store = SqliteStore::open_in_memory().unwrap();
        let word = store.add_word(ALICE, "cat", "gato").await.unwrap();

        store.increment_learned(word.id).await.unwrap();
        store.increment_learned(word.id).await.unwrap();
        assert_eq!(store.list_words(ALICE).await.unwrap()[0].times_learned, 2);

        let missing = store.increment_learned(WordId(404)).await;
        assert!(matches!(missing, Err(StorageError::NotFound(WordId(404)))));
    }

    #[tokio::test]
    async fn other_tasks_run_while_a_query_waits() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.add_word(ALICE, "cat", "gato").await.unwrap();

        // Keep the connection busy from another thread.
        let (locked_tx, locked_rx) = std::sync::mpsc::channel();
        let conn = store.conn.clone();
        let holder = std::thread::spawn(move || {
            let _guard = conn.lock().unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(300));
        });
        locked_rx.recv().unwrap();

        let started = Instant::now();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            started.elapsed()
        });
        let words = store.list_words(ALICE).await.unwrap();
        let query_took = started.elapsed();
        let timer_fired_after = timer.await.unwrap();
        holder.join().unwrap();

        assert_eq!(words.len(), 1);
        assert!(query_took >= Duration::from_millis(250), "{query_took:?}");
        assert!(
            timer_fired_after < Duration::from_millis(200),
            "timer fired after {timer_fired_after:?}, query took {query_took:?}"
        );
    }

    #[tokio::test]
    async fn stats_default_to_zero_and_count_every_answer() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get_stats(ALICE).await.unwrap(), UserStats::empty(ALICE));

        store.record_answer(ALICE, true).await.unwrap();
        store.record_answer(ALICE, false).await.unwrap();
        store.record_answer(ALICE, true).await.unwrap();

        let stats = store.get_stats(ALICE).await.unwrap();
        assert_eq!(stats.tests_passed, 3);
        assert_eq!(stats.correct_answers, 2);
        assert_eq!(store.get_stats(BOB).await.unwrap(), UserStats::empty(BOB));
    }
}
