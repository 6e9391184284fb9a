//! Registry store backed by `sled`
//!
//! Sets and hashes live in two separate trees, `sets` and `hashes`, each
//! value a JSON document (`["conn-a", "conn-b"]` or `{"topic": 2}`). Keeping
//! the two kinds apart means a topic literally named `socket:x` can never
//! clobber a reverse hash.
//!
//! Every operation, reads included, runs as a transaction over both trees,
//! so the compound operations are atomic with respect to each other and to
//! the primitives.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, Transactional, TransactionalTree,
};
use sled::{Db, Tree};

use super::RegistryStore;
use crate::utils::error::StoreError;

type Set = BTreeSet<String>;
type Hash = BTreeMap<String, i64>;
type TxResult<T> = ConflictableTransactionResult<T, StoreError>;

const SETS_TREE: &str = "sets";
const HASHES_TREE: &str = "hashes";

#[derive(Clone)]
pub struct SledStore {
    db: Db,
    sets: Tree,
    hashes: Tree,
}

impl SledStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::from_db(sled::open(path)?)
    }

    /// A throwaway database removed when the store is dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> Result<Self, StoreError> {
        let sets = db.open_tree(SETS_TREE)?;
        let hashes = db.open_tree(HASHES_TREE)?;
        Ok(Self { db, sets, hashes })
    }

    /// Block until everything written so far is durable.
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db.flush_async().await?;
        Ok(())
    }

    fn atomically<A, F>(&self, f: F) -> Result<A, StoreError>
    where
        F: Fn(&TransactionalTree, &TransactionalTree) -> TxResult<A>,
    {
        (&self.sets, &self.hashes)
            .transaction(|(sets, hashes)| f(sets, hashes))
            .map_err(StoreError::from)
    }
}

fn abort(err: impl Into<StoreError>) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(err.into())
}

fn load<T: DeserializeOwned + Default>(tree: &TransactionalTree, key: &str) -> TxResult<T> {
    match tree.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes).map_err(abort),
        None => Ok(T::default()),
    }
}

/// Write `value` at `key`, or remove the key when the collection is empty.
fn save<T: Serialize>(tree: &TransactionalTree, key: &str, value: &T, empty: bool) -> TxResult<()> {
    if empty {
        tree.remove(key)?;
    } else {
        let bytes = serde_json::to_vec(value).map_err(abort)?;
        tree.insert(key, bytes)?;
    }
    Ok(())
}

fn remove_member(sets: &TransactionalTree, key: &str, member: &str) -> TxResult<bool> {
    let mut set: Set = load(sets, key)?;
    let removed = set.remove(member);
    if removed {
        save(sets, key, &set, set.is_empty())?;
    }
    Ok(removed)
}

fn add_member(sets: &TransactionalTree, key: &str, member: &str) -> TxResult<bool> {
    let mut set: Set = load(sets, key)?;
    let added = set.insert(member.to_string());
    if added {
        save(sets, key, &set, false)?;
    }
    Ok(added)
}

fn increment(hashes: &TransactionalTree, key: &str, field: &str, delta: i64) -> TxResult<i64> {
    let mut hash: Hash = load(hashes, key)?;
    let count = hash.entry(field.to_string()).or_insert(0);
    *count += delta;
    let count = *count;
    save(hashes, key, &hash, false)?;
    Ok(count)
}

#[async_trait]
impl RegistryStore for SledStore {
    async fn set_add(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.atomically(|sets, _| add_member(sets, key, member))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.atomically(|sets, _| remove_member(sets, key, member))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.atomically(|sets, _| {
            let set: Set = load(sets, key)?;
            Ok(set.into_iter().collect())
        })
    }

    async fn hash_increment(
        &self,
        key: &str,
        field: &str,
        delta: i64,
    ) -> Result<i64, StoreError> {
        self.atomically(|_, hashes| increment(hashes, key, field, delta))
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<i64>, StoreError> {
        self.atomically(|_, hashes| {
            let hash: Hash = load(hashes, key)?;
            Ok(hash.get(field).copied())
        })
    }

    async fn hash_keys(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.atomically(|_, hashes| {
            let hash: Hash = load(hashes, key)?;
            Ok(hash.into_keys().collect())
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.atomically(|sets, hashes| {
            sets.remove(key)?;
            hashes.remove(key)?;
            Ok(())
        })
    }

    async fn retain(
        &self,
        set_key: &str,
        hash_key: &str,
        member: &str,
    ) -> Result<i64, StoreError> {
        self.atomically(|sets, hashes| {
            let count = increment(hashes, hash_key, set_key, 1)?;
            add_member(sets, set_key, member)?;
            Ok(count)
        })
    }

    async fn release(
        &self,
        set_key: &str,
        hash_key: &str,
        member: &str,
    ) -> Result<i64, StoreError> {
        self.atomically(|sets, hashes| {
            let mut hash: Hash = load(hashes, hash_key)?;
            let count = hash.get(set_key).copied().unwrap_or(0) - 1;
            if count <= 0 {
                hash.remove(set_key);
                remove_member(sets, set_key, member)?;
            } else {
                hash.insert(set_key.to_string(), count);
            }
            save(hashes, hash_key, &hash, hash.is_empty())?;
            Ok(count)
        })
    }

    async fn evict(&self, hash_key: &str, member: &str) -> Result<Vec<String>, StoreError> {
        self.atomically(|sets, hashes| {
            let hash: Hash = load(hashes, hash_key)?;
            for set_key in hash.keys() {
                remove_member(sets, set_key, member)?;
            }
            hashes.remove(hash_key)?;
            Ok(hash.into_keys().collect())
        })
    }
}

impl std::fmt::Debug for SledStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledStore")
            .field("db", &"sled::Db")
            .finish()
    }
}
