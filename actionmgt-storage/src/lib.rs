//! actionmgt Storage - Store Traits and Cache Layer
//!
//! Defines the persistence seam consumed by the management services
//! ([`ActionStore`], [`CertificateStore`]), in-memory implementations of it,
//! and the cache-backed decorators that sit between the services and any
//! durable store.
//!
//! # Cache consistency
//!
//! The cache-backed stores follow invalidate-after-write: the wrapped store
//! is always written first and the affected cache entries are removed only
//! once that write succeeded. A cached value is never replaced with a
//! caller-supplied one; the next read repopulates it from the store.
//!
//! Caches are local to one process. Several service instances sharing one
//! durable store each keep an independent cache and may serve stale data
//! until their own invalidation occurs. There is no cross-instance
//! invalidation.

pub mod cache;
pub mod cached_action;
pub mod cached_certificate;
pub mod memory;
pub mod store;

pub use cache::{CacheStats, CacheableEntity, Lookup, TenantLruCache, TenantScopedKey};
pub use cached_action::CacheBackedActionStore;
pub use cached_certificate::CacheBackedCertificateStore;
pub use memory::{InMemoryActionStore, InMemoryCertificateStore};
pub use store::{ActionCounts, ActionStore, CertificateStore};
