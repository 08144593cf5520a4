//! RecordStore trait: the abstract interface for signer record persistence.
//!
//! The ledger only needs whole-record reads and writes by signer. Any
//! durable key-value backend with single-key atomic writes satisfies it.

use std::sync::Arc;

use async_trait::async_trait;
use sigledger_core::{Address, SignerRecord};

use crate::error::Result;

/// Async key-value interface for signer records.
///
/// # Design Notes
///
/// - **Single-key atomicity**: `set` replaces the whole record or fails
///   without visible effect. There are no multi-key transactions.
/// - **Durability**: once `set` returns `Ok`, a later `get` (including after
///   a restart, for persistent backends) observes the record.
/// - **No ordering checks**: the store does not inspect records; replay
///   protection lives above it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get the record for a signer, if any.
    async fn get(&self, signer: &Address) -> Result<Option<SignerRecord>>;

    /// Replace the record for a signer.
    async fn set(&self, signer: &Address, record: &SignerRecord) -> Result<()>;

    /// List every signer that has a record, in address order.
    async fn signers(&self) -> Result<Vec<Address>>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn get(&self, signer: &Address) -> Result<Option<SignerRecord>> {
        (**self).get(signer).await
    }

    async fn set(&self, signer: &Address, record: &SignerRecord) -> Result<()> {
        (**self).set(signer, record).await
    }

    async fn signers(&self) -> Result<Vec<Address>> {
        (**self).signers().await
    }
}
