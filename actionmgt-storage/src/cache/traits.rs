//! Cacheable entity marker and cache statistics.

use actionmgt_core::{Action, Certificate, EntityKind};

/// Types the cache-backed stores keep in their entity caches.
pub trait CacheableEntity: Clone + Send + Sync + 'static {
    fn entity_kind() -> EntityKind;

    fn entity_id(&self) -> &str;
}

impl CacheableEntity for Action {
    fn entity_kind() -> EntityKind {
        EntityKind::Action
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

impl CacheableEntity for Certificate {
    fn entity_kind() -> EntityKind {
        EntityKind::Certificate
    }

    fn entity_id(&self) -> &str {
        &self.id
    }
}

/// Counters for one cache, or several merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room, not by invalidation.
    pub evictions: u64,
    /// Entries currently held across all tenants.
    pub entries: u64,
}

impl CacheStats {
    /// Hit rate between 0.0 and 1.0.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn merge(self, other: CacheStats) -> CacheStats {
        CacheStats {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            evictions: self.evictions + other.evictions,
            entries: self.entries + other.entries,
        }
    }
}
