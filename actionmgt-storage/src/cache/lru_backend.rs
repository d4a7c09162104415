//! Bounded per-tenant LRU cache with invalidation epochs.
//!
//! Each tenant gets its own `lru::LruCache` partition of fixed capacity, so
//! one busy tenant can evict only its own entries. Partitions live in an
//! outer LRU bounded by the tenant limit and exist only while they hold
//! entries: a miss allocates nothing, and a partition emptied by
//! invalidation is dropped.
//!
//! # Stale fills
//!
//! A read-through miss goes to the store without holding the lock. If a
//! write for the same tenant lands and invalidates while that fetch is in
//! flight, the value fetched may predate the write. To keep it out of the
//! cache a miss hands back a [`FillTicket`] carrying the tenant epoch, every
//! invalidation advances the epoch, and [`TenantLruCache::fill`] drops values
//! whose ticket is no longer current.
//!
//! A tenant without a partition takes the global generation as its epoch.
//! Any invalidation advances the generation, so for such tenants it may void
//! tickets that were still valid; the fill is skipped and the next read
//! fetches again.
//!
//! All state sits behind one mutex held only for in-memory work. An
//! invalidation is a single critical section: a concurrent reader sees the
//! old entry or no entry, never anything in between.

use super::tenant_key::TenantScopedKey;
use super::traits::CacheStats;
use actionmgt_core::config::DEFAULT_MAX_TENANTS;
use actionmgt_core::{StorageError, TenantId};
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Proof that a lookup missed at a given epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket {
    tenant_id: TenantId,
    epoch: u64,
}

/// Result of [`TenantLruCache::lookup`].
#[derive(Debug)]
pub enum Lookup<V> {
    Hit(V),
    Miss(FillTicket),
}

struct Partition<K: Hash + Eq, V> {
    entries: LruCache<K, V>,
    epoch: u64,
}

struct State<K: Hash + Eq, V> {
    partitions: LruCache<TenantId, Partition<K, V>>,
    generation: u64,
}

impl<K: Hash + Eq, V> State<K, V> {
    fn new(max_tenants: NonZeroUsize) -> Self {
        Self {
            partitions: LruCache::new(max_tenants),
            generation: 0,
        }
    }

    fn epoch(&self, tenant_id: TenantId) -> u64 {
        self.partitions
            .peek(&tenant_id)
            .map_or(self.generation, |partition| partition.epoch)
    }

    /// Advance the generation and stamp it on `tenant_id`'s partition.
    fn bump(&mut self, tenant_id: TenantId) {
        self.generation += 1;
        let generation = self.generation;
        if let Some(partition) = self.partitions.peek_mut(&tenant_id) {
            partition.epoch = generation;
        }
    }

    fn drop_if_empty(&mut self, tenant_id: TenantId) {
        if self
            .partitions
            .peek(&tenant_id)
            .is_some_and(|partition| partition.entries.is_empty())
        {
            self.partitions.pop(&tenant_id);
        }
    }
}

pub struct TenantLruCache<K: Hash + Eq, V> {
    name: &'static str,
    capacity: NonZeroUsize,
    max_tenants: NonZeroUsize,
    state: Mutex<State<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K, V> TenantLruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity_per_tenant` entries per
    /// tenant for up to [`DEFAULT_MAX_TENANTS`] tenants. A capacity of zero
    /// is raised to one.
    pub fn new(name: &'static str, capacity_per_tenant: usize) -> Self {
        Self::with_limits(name, capacity_per_tenant, DEFAULT_MAX_TENANTS)
    }

    /// Same as [`new`](Self::new) with an explicit tenant limit. When a new
    /// tenant would exceed it, the least recently used tenant's partition is
    /// dropped whole.
    pub fn with_limits(name: &'static str, capacity_per_tenant: usize, max_tenants: usize) -> Self {
        let max_tenants = NonZeroUsize::new(max_tenants).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            capacity: NonZeroUsize::new(capacity_per_tenant).unwrap_or(NonZeroUsize::MIN),
            max_tenants,
            state: Mutex::new(State::new(max_tenants)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity_per_tenant(&self) -> usize {
        self.capacity.get()
    }

    pub fn max_tenants(&self) -> usize {
        self.max_tenants.get()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State<K, V>>, StorageError> {
        self.state.lock().map_err(|_| StorageError::LockPoisoned)
    }

    pub fn lookup(&self, key: &TenantScopedKey<K>) -> Result<Lookup<V>, StorageError> {
        let mut guard = self.lock()?;
        let tenant_id = key.tenant_id();
        let hit = guard
            .partitions
            .get_mut(&tenant_id)
            .and_then(|partition| partition.entries.get(key.key()).cloned());
        match hit {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Lookup::Hit(value))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(Lookup::Miss(FillTicket {
                    tenant_id,
                    epoch: guard.epoch(tenant_id),
                }))
            }
        }
    }

    /// Insert a value fetched after a miss. Returns `false` (and stores
    /// nothing) when the tenant was invalidated since the ticket was issued.
    pub fn fill(
        &self,
        key: TenantScopedKey<K>,
        value: V,
        ticket: FillTicket,
    ) -> Result<bool, StorageError> {
        let (tenant_id, key) = key.into_parts();
        if ticket.tenant_id != tenant_id {
            return Ok(false);
        }
        let mut guard = self.lock()?;
        if guard.epoch(tenant_id) != ticket.epoch {
            return Ok(false);
        }

        if !guard.partitions.contains(&tenant_id) {
            let partition = Partition {
                entries: LruCache::unbounded(),
                epoch: ticket.epoch,
            };
            if let Some((_, dropped)) = guard.partitions.push(tenant_id, partition) {
                self.evictions
                    .fetch_add(dropped.entries.len() as u64, Ordering::Relaxed);
            }
        }
        let Some(partition) = guard.partitions.get_mut(&tenant_id) else {
            return Ok(false);
        };
        partition.entries.put(key, value);
        while partition.entries.len() > self.capacity.get() {
            partition.entries.pop_lru();
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Ok(true)
    }

    /// Remove one entry and void outstanding tickets of its tenant.
    pub fn invalidate(&self, key: &TenantScopedKey<K>) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        let tenant_id = key.tenant_id();
        guard.bump(tenant_id);
        let removed = guard
            .partitions
            .peek_mut(&tenant_id)
            .is_some_and(|partition| partition.entries.pop(key.key()).is_some());
        guard.drop_if_empty(tenant_id);
        Ok(removed)
    }

    /// Drop every entry of one tenant. Returns how many were removed.
    pub fn invalidate_tenant(&self, tenant_id: TenantId) -> Result<usize, StorageError> {
        let mut guard = self.lock()?;
        guard.bump(tenant_id);
        Ok(guard
            .partitions
            .pop(&tenant_id)
            .map_or(0, |partition| partition.entries.len()))
    }

    /// Drop everything and void every outstanding ticket.
    ///
    /// Also recovers a cache whose lock was poisoned: the state is discarded
    /// rather than trusted.
    pub fn clear(&self) {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.generation += 1;
        guard.partitions.clear();
        drop(guard);
        self.state.clear_poison();
    }

    /// Entries currently held for one tenant.
    pub fn tenant_len(&self, tenant_id: TenantId) -> Result<usize, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .partitions
            .peek(&tenant_id)
            .map_or(0, |partition| partition.entries.len()))
    }

    /// Tenants currently holding a partition.
    pub fn tenant_count(&self) -> Result<usize, StorageError> {
        Ok(self.lock()?.partitions.len())
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .state
            .lock()
            .map(|guard| {
                guard
                    .partitions
                    .iter()
                    .map(|(_, partition)| partition.entries.len() as u64)
                    .sum::<u64>()
            })
            .unwrap_or(0);
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries,
        }
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.state.lock();
            panic!("poisoning cache lock");
        }));
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for TenantLruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantLruCache")
            .field("name", &self.name)
            .field("capacity_per_tenant", &self.capacity)
            .field("max_tenants", &self.max_tenants)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T1: TenantId = TenantId::new(1);
    const T2: TenantId = TenantId::new(2);

    fn key(tenant: TenantId, id: &str) -> TenantScopedKey<String> {
        TenantScopedKey::entity(tenant, id)
    }

    fn miss(lookup: Lookup<u32>) -> FillTicket {
        match lookup {
            Lookup::Miss(ticket) => ticket,
            Lookup::Hit(v) => panic!("unexpected hit: {}", v),
        }
    }

    #[test]
    fn test_miss_fill_then_hit() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        let ticket = miss(cache.lookup(&key(T1, "a")).unwrap());
        assert!(cache.fill(key(T1, "a"), 7, ticket).unwrap());
        assert!(matches!(cache.lookup(&key(T1, "a")).unwrap(), Lookup::Hit(7)));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_fill_after_invalidation_is_dropped() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        let ticket = miss(cache.lookup(&key(T1, "a")).unwrap());
        cache.invalidate(&key(T1, "a")).unwrap();
        assert!(!cache.fill(key(T1, "a"), 1, ticket).unwrap());
        assert!(matches!(cache.lookup(&key(T1, "a")).unwrap(), Lookup::Miss(_)));
    }

    fn seed(cache: &TenantLruCache<String, u32>, tenant: TenantId, id: &str, value: u32) {
        let ticket = miss(cache.lookup(&key(tenant, id)).unwrap());
        assert!(cache.fill(key(tenant, id), value, ticket).unwrap());
    }

    #[test]
    fn test_other_tenant_invalidation_does_not_void_ticket() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        seed(&cache, T1, "warm", 0);
        let ticket = miss(cache.lookup(&key(T1, "a")).unwrap());
        cache.invalidate(&key(T2, "a")).unwrap();
        assert!(cache.fill(key(T1, "a"), 1, ticket).unwrap());
    }

    #[test]
    fn test_invalidation_voids_tickets_of_uncached_tenants() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        let ticket = miss(cache.lookup(&key(T1, "a")).unwrap());
        cache.invalidate(&key(T2, "a")).unwrap();
        assert!(!cache.fill(key(T1, "a"), 1, ticket).unwrap());
        // The next miss carries a current ticket.
        seed(&cache, T1, "a", 1);
    }

    #[test]
    fn test_misses_allocate_no_partitions() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        for n in 0..10_000 {
            let tenant = TenantId::new(n);
            miss(cache.lookup(&key(tenant, "a")).unwrap());
            cache.invalidate(&key(tenant, "a")).unwrap();
            cache.invalidate_tenant(tenant).unwrap();
        }
        assert_eq!(cache.tenant_count().unwrap(), 0);
        assert_eq!(cache.stats().entries, 0);
        assert_eq!(cache.stats().misses, 10_000);
    }

    #[test]
    fn test_emptied_partition_is_dropped() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        seed(&cache, T1, "a", 1);
        seed(&cache, T1, "b", 2);
        assert_eq!(cache.tenant_count().unwrap(), 1);

        assert!(cache.invalidate(&key(T1, "a")).unwrap());
        assert_eq!(cache.tenant_count().unwrap(), 1);
        assert!(cache.invalidate(&key(T1, "b")).unwrap());
        assert_eq!(cache.tenant_count().unwrap(), 0);
    }

    #[test]
    fn test_tenant_limit_drops_least_recent_tenant() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::with_limits("test", 4, 2);
        seed(&cache, T1, "a", 1);
        seed(&cache, T1, "b", 2);
        seed(&cache, T2, "a", 3);
        // Touch T1 so T2 becomes the least recent tenant.
        assert!(matches!(cache.lookup(&key(T1, "a")).unwrap(), Lookup::Hit(1)));

        let t3 = TenantId::new(3);
        seed(&cache, t3, "a", 4);

        assert_eq!(cache.tenant_count().unwrap(), 2);
        assert_eq!(cache.tenant_len(T2).unwrap(), 0);
        assert_eq!(cache.tenant_len(T1).unwrap(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_ticket_is_bound_to_its_tenant() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        let ticket = miss(cache.lookup(&key(T1, "a")).unwrap());
        assert!(!cache.fill(key(T2, "a"), 1, ticket).unwrap());
        assert_eq!(cache.tenant_len(T2).unwrap(), 0);
    }

    #[test]
    fn test_fill_after_clear_is_dropped() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        let ticket = miss(cache.lookup(&key(T1, "a")).unwrap());
        cache.clear();
        assert!(!cache.fill(key(T1, "a"), 1, ticket).unwrap());
    }

    #[test]
    fn test_clear_recovers_poisoned_lock() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        seed(&cache, T1, "a", 1);
        cache.poison();
        assert!(matches!(
            cache.lookup(&key(T1, "a")),
            Err(StorageError::LockPoisoned)
        ));

        cache.clear();
        assert!(matches!(cache.lookup(&key(T1, "a")).unwrap(), Lookup::Miss(_)));
        seed(&cache, T1, "a", 2);
        assert!(matches!(cache.lookup(&key(T1, "a")).unwrap(), Lookup::Hit(2)));
    }

    #[test]
    fn test_capacity_is_per_tenant_and_counts_evictions() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 2);
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            let ticket = miss(cache.lookup(&key(T1, id)).unwrap());
            cache.fill(key(T1, id), i as u32, ticket).unwrap();
        }
        let ticket = miss(cache.lookup(&key(T2, "z")).unwrap());
        cache.fill(key(T2, "z"), 9, ticket).unwrap();

        assert_eq!(cache.tenant_len(T1).unwrap(), 2);
        assert_eq!(cache.tenant_len(T2).unwrap(), 1);
        assert_eq!(cache.stats().evictions, 1);
        // "a" was least recently used.
        assert!(matches!(cache.lookup(&key(T1, "a")).unwrap(), Lookup::Miss(_)));
    }

    #[test]
    fn test_invalidate_tenant() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 4);
        for id in ["a", "b"] {
            let ticket = miss(cache.lookup(&key(T1, id)).unwrap());
            cache.fill(key(T1, id), 0, ticket).unwrap();
        }
        assert_eq!(cache.invalidate_tenant(T1).unwrap(), 2);
        assert_eq!(cache.tenant_len(T1).unwrap(), 0);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let cache: TenantLruCache<String, u32> = TenantLruCache::new("test", 0);
        assert_eq!(cache.capacity_per_tenant(), 1);
    }
}
