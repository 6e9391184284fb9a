//! In-memory registry store
//!
//! All state sits behind one `parking_lot::Mutex`, so every trait method,
//! compound ones included, is a single critical section. Empty sets and
//! hashes are dropped as soon as they empty out.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::RegistryStore;
use crate::utils::error::StoreError;

#[derive(Debug, Default)]
struct Indices {
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, i64>>,
}

impl Indices {
    fn sadd(&mut self, key: &str, member: &str) -> bool {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string())
    }

    fn srem(&mut self, key: &str, member: &str) -> bool {
        let Some(set) = self.sets.get_mut(key) else {
            return false;
        };
        let removed = set.remove(member);
        if set.is_empty() {
            self.sets.remove(key);
        }
        removed
    }

    fn hincrby(&mut self, key: &str, field: &str, delta: i64) -> i64 {
        let count = self
            .hashes
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert(0);
        *count += delta;
        *count
    }

    fn hdel(&mut self, key: &str, field: &str) {
        if let Some(hash) = self.hashes.get_mut(key) {
            hash.remove(field);
            if hash.is_empty() {
                self.hashes.remove(key);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Indices>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut items: Vec<String> = items.into_iter().collect();
    items.sort();
    items
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().sadd(key, member))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().srem(key, member))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .sets
            .get(key)
            .map(|set| sorted(set.iter().cloned()))
            .unwrap_or_default())
    }

    async fn hash_increment(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        Ok(self.inner.lock().hincrby(key, field, delta))
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<i64>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner.hashes.get(key).and_then(|h| h.get(field).copied()))
    }

    async fn hash_keys(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .hashes
            .get(key)
            .map(|h| sorted(h.keys().cloned()))
            .unwrap_or_default())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.sets.remove(key);
        inner.hashes.remove(key);
        Ok(())
    }

    async fn retain(
        &self,
        set_key: &str,
        hash_key: &str,
        member: &str,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        let count = inner.hincrby(hash_key, set_key, 1);
        inner.sadd(set_key, member);
        Ok(count)
    }

    async fn release(
        &self,
        set_key: &str,
        hash_key: &str,
        member: &str,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        let count = inner.hincrby(hash_key, set_key, -1);
        if count <= 0 {
            inner.hdel(hash_key, set_key);
            inner.srem(set_key, member);
        }
        Ok(count)
    }

    async fn evict(&self, hash_key: &str, member: &str) -> Result<Vec<String>, StoreError> {
        let mut inner = self.inner.lock();
        let fields = inner
            .hashes
            .remove(hash_key)
            .map(|h| sorted(h.into_keys()))
            .unwrap_or_default();
        for set_key in &fields {
            inner.srem(set_key, member);
        }
        Ok(fields)
    }
}
