use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::quiz::QuizSession;
use crate::storage::OwnerId;

const SHARDS: usize = 16;

/// In-memory quiz sessions, one per user.
///
/// Nothing here survives a restart. Users are spread over a fixed number of
/// shards so that different users rarely wait on the same lock, and locks are
/// never held across an `.await`.
pub struct SessionState {
    shards: Vec<Mutex<HashMap<OwnerId, QuizSession>>>,
    next_tag: AtomicU64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        // Random start so buttons left over from a previous run never match.
        Self::with_first_tag(u64::from(rand::random::<u32>()))
    }

    pub fn with_first_tag(first_tag: u64) -> Self {
        Self {
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
            next_tag: AtomicU64::new(first_tag),
        }
    }

    fn shard(&self, owner: OwnerId) -> MutexGuard<'_, HashMap<OwnerId, QuizSession>> {
        let mut hasher = DefaultHasher::new();
        owner.hash(&mut hasher);
        let shard = &self.shards[hasher.finish() as usize % SHARDS];
        // A panic while holding the lock cannot leave a map half-updated.
        shard.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `session`, replacing whatever the user had before.
    pub fn put(&self, owner: OwnerId, session: QuizSession) {
        self.shard(owner).insert(owner, session);
    }

    pub fn get(&self, owner: OwnerId) -> Option<QuizSession> {
        self.shard(owner).get(&owner).cloned()
    }

    pub fn clear(&self, owner: OwnerId) -> Option<QuizSession> {
        self.shard(owner).remove(&owner)
    }

    /// Tag for a newly committed question; never repeats within a process.
    pub fn next_tag(&self) -> u64 {
        self.next_tag.fetch_add(1, Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().map(|map| map.len()).unwrap_or_default())
            .sum()
    }
}
