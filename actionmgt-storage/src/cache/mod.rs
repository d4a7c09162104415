//! Tenant-scoped cache layer used by the cache-backed stores.
//!
//! Keys cannot be built without a tenant id ([`TenantScopedKey`]) and every
//! tenant has its own bounded LRU partition ([`TenantLruCache`]). Values
//! fetched on a miss are only inserted if no invalidation happened in that
//! tenant in the meantime; see [`lru_backend`] for how that is tracked and
//! when the check is stricter than that.

pub mod lru_backend;
pub mod tenant_key;
pub mod traits;

pub use lru_backend::{FillTicket, Lookup, TenantLruCache};
pub use tenant_key::TenantScopedKey;
pub use traits::{CacheStats, CacheableEntity};
