//! The `persistence` module holds the shared registry store: the key-value
//! backend that carries the forward and reverse subscription indices.
//!
//! The broker only ever talks to the [`RegistryStore`] trait. Two backends
//! ship with the crate:
//! - [`MemoryStore`], a process-local store guarded by a single mutex
//! - [`SledStore`], an embedded `sled` database that survives restarts
//!
//! Besides the per-key primitives, the trait exposes three compound
//! operations (`retain`, `release`, `evict`) that each touch a set and a hash
//! in one atomic step. The registry's cross-index invariant depends on them.

pub mod memory_store;
pub mod sled_store;

use async_trait::async_trait;

use crate::utils::error::StoreError;

pub use memory_store::MemoryStore;
pub use sled_store::SledStore;

#[async_trait]
pub trait RegistryStore: Send + Sync + std::fmt::Debug {
    /// Add `member` to the set at `key`. Returns `true` if it was not present.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Remove `member` from the set at `key`. Returns `true` if it was present.
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Add `delta` to a hash field, creating it at zero. Returns the new value.
    async fn hash_increment(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, StoreError>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<i64>, StoreError>;

    async fn hash_keys(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Delete whatever lives at `key`.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Atomically increment `hash_key[set_key]` and add `member` to the set at
    /// `set_key`. Returns the new count.
    async fn retain(
        &self,
        set_key: &str,
        hash_key: &str,
        member: &str,
    ) -> Result<i64, StoreError>;

    /// Atomically decrement `hash_key[set_key]`; when the result is zero or
    /// below, drop the field and remove `member` from the set at `set_key`.
    /// Returns the decremented value, which is negative if nothing was held.
    async fn release(
        &self,
        set_key: &str,
        hash_key: &str,
        member: &str,
    ) -> Result<i64, StoreError>;

    /// Atomically remove `member` from the set named by every field of
    /// `hash_key`, then delete the hash. Returns the fields it held.
    async fn evict(&self, hash_key: &str, member: &str) -> Result<Vec<String>, StoreError>;
}
