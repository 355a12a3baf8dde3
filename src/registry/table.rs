//! Ownership Table
//!
//! Maps object addresses to their `OwnershipRecord`.
//!
//! # Locking
//! - Each shard is a `spin::Mutex` around a `HashMap`
//! - `acquire`, `share` and `release` each take exactly one shard lock
//! - Deleters run after their record is unlinked and the lock is dropped,
//!   so a destructor may freely create or release other handles

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::HashMap;
use std::sync::Arc;

use spin::Mutex;

use super::config::RegistryConfig;
use super::record::{Deleter, OwnershipRecord};
use crate::types::ObjectAddr;

type Shard = Mutex<HashMap<ObjectAddr, Arc<OwnershipRecord>>>;

/// Process-wide ownership table.
///
/// Construct one with `HandleRegistry::new` at startup and pass it to every
/// handle. Tests build isolated instances.
pub struct HandleRegistry {
    shards: Box<[Shard]>,
    /// `shards.len() - 1`; shard count is a power of two.
    mask: usize,
    next_id: AtomicU64,
}

impl HandleRegistry {
    /// Create a registry.
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        let count = config.effective_shards();
        let shards = (0..count)
            .map(|_| Mutex::new(HashMap::with_capacity(config.initial_capacity)))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        log::debug!("handle registry created with {} shard(s)", count);

        Arc::new(Self {
            shards,
            mask: count - 1,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a registry with the default single-shard configuration.
    pub fn with_defaults() -> Arc<Self> {
        Self::new(RegistryConfig::default())
    }

    /// Number of lock shards.
    #[inline]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    #[inline]
    fn shard(&self, addr: ObjectAddr) -> &Shard {
        // Low bits are mostly alignment; fold higher bits in.
        let a = addr.as_usize();
        let index = ((a >> 4) ^ (a >> 12)) & self.mask;
        &self.shards[index]
    }

    /// Join or create the record for `addr`.
    ///
    /// If a record exists, the caller becomes one more holder of it and
    /// `factory` is not called. Otherwise `factory` builds the deleter for a
    /// fresh record with a single holder.
    pub fn acquire<F>(&self, addr: ObjectAddr, factory: F) -> Arc<OwnershipRecord>
    where
        F: FnOnce() -> Deleter,
    {
        let mut table = self.shard(addr).lock();

        if let Some(record) = table.get(&addr) {
            let holders = record.retain();
            log::trace!("acquire {}: joined record {} ({} holders)", addr, record.id(), holders);
            return record.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(OwnershipRecord::new(id, addr, factory()));
        record.retain();
        table.insert(addr, record.clone());

        log::debug!("acquire {}: new record {} for {}", addr, id, record.type_identity());
        record
    }

    /// Add a holder to a record the caller already holds.
    ///
    /// This is the clone path: it never consults a factory. The caller must
    /// own a live holder of `record`, which keeps it registered; only
    /// `TypedHandle::clone` calls this. The returned record is the one found
    /// in the table.
    pub(crate) fn share(&self, record: &Arc<OwnershipRecord>) -> Arc<OwnershipRecord> {
        let addr = record.addr();
        let table = self.shard(addr).lock();
        let shared = match table.get(&addr) {
            Some(registered) => registered.clone(),
            None => {
                log::error!("share {}: record {} is not registered", addr, record.id());
                record.clone()
            }
        };
        let holders = shared.retain();
        drop(table);

        log::trace!("share {}: record {} ({} holders)", addr, shared.id(), holders);
        shared
    }

    /// Drop one holder of the record for `addr`.
    ///
    /// When the last holder goes, the record is unlinked and its deleter
    /// runs once the shard lock has been released.
    pub fn release(&self, addr: ObjectAddr) {
        let mut table = self.shard(addr).lock();

        let Some(record) = table.get(&addr) else {
            drop(table);
            log::error!("release {}: no ownership record", addr);
            return;
        };

        let remaining = record.unretain();
        log::trace!("release {}: record {} ({} holders)", addr, record.id(), remaining);
        if remaining > 0 {
            return;
        }

        let record = table.remove(&addr);
        drop(table);

        // The entry is gone before the object is: a reused address always
        // gets a fresh record.
        if let Some(record) = record {
            if let Some(deleter) = record.take_deleter() {
                log::debug!("destroying {} at {} (record {})", deleter.target(), addr, record.id());
                deleter.run();
            }
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    /// Check if no records are live.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.lock().is_empty())
    }

    /// Check if `addr` has a live record.
    pub fn contains(&self, addr: ObjectAddr) -> bool {
        self.shard(addr).lock().contains_key(&addr)
    }

    /// Number of holders of the record for `addr`, if any.
    pub fn holders(&self, addr: ObjectAddr) -> Option<usize> {
        self.shard(addr).lock().get(&addr).map(|r| r.holders())
    }

    /// The live record for `addr`, if any.
    pub fn record(&self, addr: ObjectAddr) -> Option<Arc<OwnershipRecord>> {
        self.shard(addr).lock().get(&addr).cloned()
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("shards", &self.shards.len())
            .field("records", &self.len())
            .finish()
    }
}

impl Drop for HandleRegistry {
    fn drop(&mut self) {
        let leaked = self.len();
        if leaked > 0 {
            log::warn!("handle registry dropped with {} live record(s); objects leaked", leaked);
        }
    }
}
