//! Backing-store protocol.
//!
//! Views talk to the key-value store only through [`BackingStore`]: hash reads,
//! set reads, atomic [`WriteBatch`] execution and guarded execution that
//! applies a batch only while a hash field still holds the value a caller read.
//! `MemoryStore` is the in-process implementation; the redis adapter lives in
//! `infra::redis`.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use async_trait::async_trait;
use thiserror::Error;

use super::lock::recover;

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("backing store unavailable: {0}")]
    Connection(String),
    #[error("backing store protocol error: {0}")]
    Protocol(String),
}

/// One write inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    HashSet {
        key: String,
        field: String,
        value: String,
    },
    Delete {
        key: String,
    },
    SetAdd {
        key: String,
        member: String,
    },
}

/// Ordered writes applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hset(
        &mut self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.ops.push(WriteOp::HashSet {
            key: key.into(),
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::Delete { key: key.into() });
        self
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.ops.push(WriteOp::SetAdd {
            key: key.into(),
            member: member.into(),
        });
        self
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteOp;
    type IntoIter = std::vec::IntoIter<WriteOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Precondition for [`BackingStore::execute_if`]: `field` of hash `key` holds
/// `expected`, where `None` means the field is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGuard {
    pub key: String,
    pub field: String,
    pub expected: Option<String>,
}

#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Apply every op in order; readers never observe a partial batch.
    async fn execute(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Check the guard and apply the batch as one atomic step.
    ///
    /// Returns `false` without writing anything when the guard no longer holds.
    async fn execute_if(&self, guard: &FieldGuard, batch: WriteBatch) -> Result<bool, StoreError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
}

impl MemoryState {
    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::HashSet { key, field, value } => {
                self.hashes.entry(key).or_default().insert(field, value);
            }
            WriteOp::Delete { key } => {
                self.hashes.remove(&key);
                self.sets.remove(&key);
            }
            WriteOp::SetAdd { key, member } => {
                self.sets.entry(key).or_default().insert(member);
            }
        }
    }
}

/// In-process backing store; one write lock per batch gives atomicity.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently holding data.
    pub fn key_count(&self) -> usize {
        let state = recover(self.state.read(), SOURCE, "key_count");
        state.hashes.len() + state.sets.len()
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn execute(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut state = recover(self.state.write(), SOURCE, "execute");
        for op in batch {
            state.apply(op);
        }
        Ok(())
    }

    async fn execute_if(&self, guard: &FieldGuard, batch: WriteBatch) -> Result<bool, StoreError> {
        let mut state = recover(self.state.write(), SOURCE, "execute_if");
        let current = state
            .hashes
            .get(&guard.key)
            .and_then(|hash| hash.get(&guard.field));
        if current != guard.expected.as_ref() {
            return Ok(false);
        }
        for op in batch {
            state.apply(op);
        }
        Ok(true)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        Ok(recover(self.state.read(), SOURCE, "hash_get_all")
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(recover(self.state.read(), SOURCE, "hash_get")
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned())
    }

    async fn set_members(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        Ok(recover(self.state.read(), SOURCE, "set_members")
            .sets
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}
