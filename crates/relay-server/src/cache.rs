use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use relay_contracts::RecommendationResult;
use tokio::sync::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: StdMutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: StdMutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub result: RecommendationResult,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub generation: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashMap<String, u64>,
    last_generation: u64,
}

impl CacheState {
    fn next_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }
}

/// Conversation id -> latest recommendation outcome. Entries expire lazily on
/// read; `sweep_expired` reclaims memory.
pub struct ResultCache {
    ttl: chrono::Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState>,
}

impl ResultCache {
    pub fn new(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            max_entries: max_entries.max(1),
            clock,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Unconditional overwrite.
    pub async fn put(&self, key: &str, result: RecommendationResult) {
        let mut state = self.state.lock().await;
        let generation = state.next_generation();
        self.insert(&mut state, key, result, generation);
    }

    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        state
            .entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .cloned()
    }

    pub async fn status(&self, key: &str) -> RecommendationResult {
        self.get(key)
            .await
            .map(|entry| entry.result)
            .unwrap_or(RecommendationResult::Pending)
    }

    /// Registers a new job for `key` and drops whatever the previous job left,
    /// so polls report "still processing" until this job completes.
    pub async fn begin_job(&self, key: &str) -> u64 {
        let mut state = self.state.lock().await;
        let generation = state.next_generation();
        state.entries.remove(key);
        state.in_flight.insert(key.to_string(), generation);
        generation
    }

    /// Stores a job outcome unless a newer job or write for `key` exists.
    /// Returns whether the result was stored.
    pub async fn complete(&self, key: &str, generation: u64, result: RecommendationResult) -> bool {
        let mut state = self.state.lock().await;
        let latest_started = state.in_flight.get(key).copied().unwrap_or(0);
        let latest_written = state
            .entries
            .get(key)
            .map(|entry| entry.generation)
            .unwrap_or(0);
        if latest_started == generation {
            state.in_flight.remove(key);
        }
        if generation < latest_started || generation < latest_written {
            return false;
        }
        self.insert(&mut state, key, result, generation);
        true
    }

    pub async fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state.entries.retain(|_, entry| now < entry.expires_at);
        before - state.entries.len()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn insert(
        &self,
        state: &mut CacheState,
        key: &str,
        result: RecommendationResult,
        generation: u64,
    ) {
        let now = self.clock.now();
        if !state.entries.contains_key(key) && state.entries.len() >= self.max_entries {
            state.entries.retain(|_, entry| now < entry.expires_at);
            if state.entries.len() >= self.max_entries {
                let oldest = state
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.expires_at)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    state.entries.remove(&oldest);
                }
            }
        }
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                result,
                created_at: now,
                expires_at: now
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
                generation,
            },
        );
    }
}
