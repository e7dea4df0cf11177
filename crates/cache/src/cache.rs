use crate::clock::{Clock, SystemClock};
use crate::entry::{CacheEntry, IndexRecord};
use crate::key::CacheKey;
use crate::storage::{CacheStorage, StorageError};
use core_types::GenerationResult;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

const LOG_TARGET: &str = "cache";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            max_entries: 50,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub evictions: u64,
    pub store_failures: u64,
}

/// Two-tier generation cache: an in-process map in front of a [`CacheStorage`].
///
/// The in-process tier is authoritative. Storage failures are logged and
/// counted, never surfaced, so a broken or full disk only costs persistence.
/// The persisted index only names keys whose entry was stored durably.
pub struct GenerationCache<S, C = SystemClock> {
    fast: HashMap<CacheKey, CacheEntry>,
    index: Vec<IndexRecord>,
    /// Indexed keys held only in the fast tier.
    volatile: HashSet<CacheKey>,
    storage: S,
    clock: C,
    config: CacheConfig,
    stats: CacheStats,
}

impl<S: CacheStorage> GenerationCache<S, SystemClock> {
    pub fn new(storage: S, config: CacheConfig) -> Self {
        Self::with_clock(storage, SystemClock, config)
    }
}

impl<S: CacheStorage, C: Clock> GenerationCache<S, C> {
    pub fn with_clock(storage: S, clock: C, config: CacheConfig) -> Self {
        let mut cache = Self {
            fast: HashMap::new(),
            index: Vec::new(),
            volatile: HashSet::new(),
            storage,
            clock,
            config,
            stats: CacheStats::default(),
        };
        match cache.storage.list_index() {
            Ok(index) => cache.index = index,
            Err(err) => {
                cache.store_failed("reading index", err);
                cache.rebuild_index();
            }
        }
        cache
    }

    /// Recreate the index from the stored entries themselves, dropping
    /// entries that no longer decode.
    fn rebuild_index(&mut self) {
        let keys = match self.storage.list_keys() {
            Ok(keys) => keys,
            Err(err) => return self.store_failed("listing entries", err),
        };
        for key in keys {
            match self.storage.get(&key) {
                Ok(Some(entry)) => self.index.push(IndexRecord {
                    key,
                    timestamp: entry.timestamp,
                }),
                Ok(None) => {}
                Err(err) => {
                    self.store_failed("reading entry", err);
                    if let Err(err) = self.storage.remove(&key) {
                        self.store_failed("removing entry", err);
                    }
                }
            }
        }
        self.index.sort_by_key(|r| r.timestamp);
        log::info!(target: LOG_TARGET, "rebuilt index with {} entries", self.index.len());
        self.persist_index();
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = match self.fast.get(key) {
            Some(entry) => Some(entry.clone()),
            None => match self.storage.get(key) {
                Ok(found) => found,
                Err(err) => {
                    self.store_failed("reading entry", err);
                    None
                }
            },
        };

        let Some(entry) = entry else {
            self.stats.misses += 1;
            if self.is_indexed(key) {
                log::debug!(target: LOG_TARGET, "{key} indexed without an entry");
                self.purge(key);
                self.persist_index();
            }
            return None;
        };
        if self.is_expired(entry.timestamp) {
            log::debug!(target: LOG_TARGET, "{key} expired");
            self.stats.expirations += 1;
            self.stats.misses += 1;
            self.purge(key);
            self.persist_index();
            return None;
        }

        self.stats.hits += 1;
        if !self.is_indexed(key) {
            self.index.push(IndexRecord {
                key: key.clone(),
                timestamp: entry.timestamp,
            });
            self.persist_index();
        }
        self.fast.entry(key.clone()).or_insert_with(|| entry.clone());
        Some(entry)
    }

    pub fn set(&mut self, key: &CacheKey, result: &GenerationResult) {
        let entry = CacheEntry::new(self.clock.now_ms(), result);
        match self.storage.set(key, &entry) {
            Ok(()) => {
                self.volatile.remove(key);
            }
            Err(err) => {
                self.store_failed("writing entry", err);
                // An older stored copy would outlive the index record.
                if let Err(err) = self.storage.remove(key) {
                    self.store_failed("removing entry", err);
                }
                self.volatile.insert(key.clone());
            }
        }
        self.index.retain(|r| &r.key != key);
        self.index.push(IndexRecord {
            key: key.clone(),
            timestamp: entry.timestamp,
        });
        self.fast.insert(key.clone(), entry);

        while self.index.len() > self.config.max_entries {
            let Some(oldest) = self.oldest_position() else {
                break;
            };
            let record = self.index.remove(oldest);
            log::debug!(target: LOG_TARGET, "evicting {}", record.key);
            self.stats.evictions += 1;
            self.purge(&record.key);
        }
        self.persist_index();
    }

    /// Drop `key` from both tiers, e.g. after the document it names was refined.
    pub fn invalidate(&mut self, key: &CacheKey) {
        self.purge(key);
        self.persist_index();
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn prune_expired(&mut self) -> usize {
        let expired: Vec<CacheKey> = self
            .index
            .iter()
            .filter(|r| self.is_expired(r.timestamp))
            .map(|r| r.key.clone())
            .collect();
        for key in &expired {
            self.purge(key);
        }
        if !expired.is_empty() {
            self.stats.expirations += expired.len() as u64;
            self.persist_index();
        }
        expired.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.index.iter().map(|r| &r.key)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    fn is_expired(&self, timestamp: u64) -> bool {
        let age = self.clock.now_ms().saturating_sub(timestamp);
        u128::from(age) > self.config.ttl.as_millis()
    }

    /// Oldest timestamp first; ties go to the earlier write.
    fn oldest_position(&self) -> Option<usize> {
        self.index
            .iter()
            .enumerate()
            .min_by_key(|(pos, r)| (r.timestamp, *pos))
            .map(|(pos, _)| pos)
    }

    fn is_indexed(&self, key: &CacheKey) -> bool {
        self.index.iter().any(|r| &r.key == key)
    }

    fn purge(&mut self, key: &CacheKey) {
        self.fast.remove(key);
        self.volatile.remove(key);
        self.index.retain(|r| &r.key != key);
        if let Err(err) = self.storage.remove(key) {
            self.store_failed("removing entry", err);
        }
    }

    fn persist_index(&mut self) {
        let durable: Vec<IndexRecord> = self
            .index
            .iter()
            .filter(|r| !self.volatile.contains(&r.key))
            .cloned()
            .collect();
        if let Err(err) = self.storage.write_index(&durable) {
            self.store_failed("writing index", err);
        }
    }

    fn store_failed(&mut self, action: &str, err: StorageError) {
        self.stats.store_failures += 1;
        log::warn!(target: LOG_TARGET, "{action} failed, continuing without it: {err}");
    }
}
