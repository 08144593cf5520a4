//! In-memory implementation of the RecordStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use sigledger_core::{Address, SignerRecord};

use crate::error::{Result, StoreError};
use crate::traits::RecordStore;

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    records: RwLock<HashMap<Address, SignerRecord>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Unavailable(format!("lock poisoned: {}", e))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, signer: &Address) -> Result<Option<SignerRecord>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(signer).cloned())
    }

    async fn set(&self, signer: &Address, record: &SignerRecord) -> Result<()> {
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(*signer, record.clone());
        Ok(())
    }

    async fn signers(&self) -> Result<Vec<Address>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut signers: Vec<Address> = records.keys().copied().collect();
        signers.sort();
        Ok(signers)
    }
}
