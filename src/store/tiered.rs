//! Two-tier cache entry store.
//!
//! Fast tier: an in-process map of [`ResourceKey`] → [`CacheEntry`]. Durable
//! tier: a [`BlobStore`] mirror that survives restarts. Reads check memory
//! first and fall back to the blob tier, promoting what they find; writes
//! land in memory synchronously and mirror to the blob tier on a background
//! task so a slow disk never delays the caller.
//!
//! Nothing here judges freshness: the store hands back whatever entry it
//! has, stamped, and the service compares the stamp against the class TTL.
//! Staleness never evicts an entry; only invalidation or replacement does.

use crate::clock::Clock;
use crate::resource::models;
use crate::resource::{ResourceClass, ResourceKey};
use crate::store::blob::BlobStore;
use crate::store::entry::CacheEntry;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Counters for observing tier behavior.
#[derive(Debug, Default, Clone)]
pub struct StoreStats {
    /// Reads served from the memory tier.
    pub memory_hits: u64,
    /// Reads that missed memory but were served from the blob tier.
    pub blob_promotions: u64,
    /// Reads that found nothing in either tier.
    pub misses: u64,
}

/// Two-tier store for cache entries.
pub struct EntryStore {
    memory: Mutex<HashMap<ResourceKey, CacheEntry>>,
    blob: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    stats: Mutex<StoreStats>,
}

impl EntryStore {
    /// Creates a store over the given durable tier and clock.
    pub fn new(blob: Arc<dyn BlobStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            blob,
            clock,
            stats: Mutex::new(StoreStats::default()),
        }
    }

    /// Returns the entry for `key`, fresh or stale, from either tier.
    ///
    /// A memory miss falls back to the blob tier; a valid blob is promoted
    /// into memory before returning so the next read is fast. Blob-tier
    /// failures of any kind (I/O error, missing stamp, payload that no
    /// longer decodes) are misses, never errors.
    pub fn get(&self, key: &ResourceKey) -> Option<CacheEntry> {
        {
            let memory = self.memory.lock().unwrap();
            if let Some(entry) = memory.get(key) {
                self.stats.lock().unwrap().memory_hits += 1;
                return Some(entry.clone());
            }
        }

        match self.read_blob(key) {
            Some(entry) => {
                let mut memory = self.memory.lock().unwrap();
                // A concurrent put may have landed while we read the blob;
                // whatever is in memory now is newer than the blob copy.
                let entry = memory
                    .entry(key.clone())
                    .or_insert(entry)
                    .clone();
                self.stats.lock().unwrap().blob_promotions += 1;
                debug!(key = %key, "promoted entry from durable tier");
                Some(entry)
            }
            None => {
                self.stats.lock().unwrap().misses += 1;
                None
            }
        }
    }

    /// Stores `payload` for `key`, stamped with the current time.
    ///
    /// Memory is updated synchronously; the durable mirror is scheduled as
    /// a best-effort background write. A durable-write failure is logged
    /// and does not fail the put.
    pub fn put(&self, key: &ResourceKey, payload: Bytes) -> CacheEntry {
        let entry = CacheEntry::new(payload, self.clock.now());

        {
            let mut memory = self.memory.lock().unwrap();
            memory.insert(key.clone(), entry.clone());
        }

        self.schedule_durable_write(key, &entry);
        entry
    }

    /// Removes the entry for `key` from both tiers.
    pub fn clear(&self, key: &ResourceKey) {
        self.memory.lock().unwrap().remove(key);
        if let Err(e) = self.blob.delete(&key.storage_name()) {
            warn!(key = %key, error = %e, "failed to delete durable entry");
        }
    }

    /// Removes every entry of `class` from both tiers.
    ///
    /// The durable tier is purged by class name, so persisted entries never
    /// promoted into memory are removed too.
    pub fn clear_class(&self, class: ResourceClass) {
        self.memory.lock().unwrap().retain(|k, _| k.class() != class);
        if let Err(e) = self.blob.delete_class(class.name()) {
            warn!(class = %class, error = %e, "failed to delete durable class");
        }
    }

    /// Snapshot of the tier counters.
    pub fn stats(&self) -> StoreStats {
        self.stats.lock().unwrap().clone()
    }

    /// Number of entries in the memory tier.
    pub fn entry_count(&self) -> usize {
        self.memory.lock().unwrap().len()
    }

    fn read_blob(&self, key: &ResourceKey) -> Option<CacheEntry> {
        let name = key.storage_name();

        let payload = match self.blob.get(&name) {
            Ok(Some(data)) if !data.is_empty() => data,
            Ok(_) => return None,
            Err(e) => {
                debug!(key = %key, error = %e, "durable read failed, treating as miss");
                return None;
            }
        };

        let stored_at = match self.blob.stamp(&name) {
            Ok(Some(at)) => at,
            // No stamp means unknown age: unusable for freshness decisions.
            Ok(None) => return None,
            Err(e) => {
                debug!(key = %key, error = %e, "durable stamp unreadable, treating as miss");
                return None;
            }
        };

        // Corrupt persisted data never blocks the caller.
        if models::validate(key.class(), &payload).is_err() {
            warn!(key = %key, "durable payload no longer decodes, treating as miss");
            return None;
        }

        Some(CacheEntry::new(Bytes::from(payload), stored_at))
    }

    fn schedule_durable_write(&self, key: &ResourceKey, entry: &CacheEntry) {
        let blob = Arc::clone(&self.blob);
        let name = key.storage_name();
        let payload = entry.payload.clone();
        let stored_at = entry.stored_at;

        let write = move || {
            if let Err(e) = blob
                .set(&name, &payload)
                .and_then(|()| blob.set_stamp(&name, stored_at))
            {
                warn!(key = %name, error = %e, "durable write failed (entry stays in memory)");
            }
        };

        // Mirror on the blocking pool when a runtime is available; callers
        // outside a runtime (sync tests) just pay the write inline.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }
}
