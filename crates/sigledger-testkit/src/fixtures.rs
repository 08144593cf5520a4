//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{json, Value};

use sigledger::core::{keccak256, Address, DigestBuilder, FieldValues, Keypair, PayloadError, SignerRecord};
use sigledger::store::{MemoryStore, RecordStore, StoreError};
use sigledger::{LedgerConfig, Submission, DEFAULT_ACTION};

/// A wallet stand-in that signs submissions for a given configuration.
pub struct TestSigner {
    pub keypair: Keypair,
}

impl TestSigner {
    /// Create a signer with a random key.
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    /// Create with a deterministic key derived from `seed`.
    pub fn with_seed(seed: &[u8]) -> Self {
        let secret = keccak256(seed);
        Self {
            keypair: Keypair::from_secret_bytes(&secret.0)
                .expect("keccak output is a valid secret key"),
        }
    }

    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// Sign `values` under `action_tag` as `config` would digest them.
    pub fn sign(
        &self,
        config: &LedgerConfig,
        action_tag: &str,
        values: Value,
    ) -> Result<Submission, PayloadError> {
        let action = config
            .actions
            .get(action_tag)
            .ok_or_else(|| PayloadError::UnknownAction(action_tag.to_string()))?;
        let values = match values {
            Value::Object(map) => map,
            _ => return Err(PayloadError::NotAnObject(action_tag.to_string())),
        };
        let digest = DigestBuilder::new(config.domain.clone()).digest(action.schema(), &values)?;
        let signature = self.keypair.sign_digest(&digest).to_bytes();
        Ok(Submission::new(action_tag, values, signature.to_vec()).with_signer(self.address()))
    }

    /// Sign a `new-message` payload under `config`.
    pub fn message(
        &self,
        config: &LedgerConfig,
        message: &str,
        urgent: bool,
        timestamp: u64,
    ) -> Submission {
        self.sign(config, DEFAULT_ACTION, Value::Object(message_values(message, urgent, timestamp)))
            .expect("new-message values match the built-in schema")
    }
}

impl Default for TestSigner {
    fn default() -> Self {
        Self::new()
    }
}

/// Values of a `new-message` payload.
pub fn message_values(message: &str, urgent: bool, timestamp: u64) -> FieldValues {
    match json!({ "message": message, "urgent": urgent, "timestamp": timestamp }) {
        Value::Object(map) => map,
        _ => FieldValues::new(),
    }
}

/// Create multiple deterministic signers for multi-party tests.
pub fn multi_signers(count: usize) -> Vec<TestSigner> {
    (0..count)
        .map(|i| TestSigner::with_seed(format!("signer-{}", i).as_bytes()))
        .collect()
}

/// A store wrapper whose reads or writes can be switched to fail.
pub struct FailingStore<S = MemoryStore> {
    inner: S,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<S: RecordStore> FailingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl FailingStore<MemoryStore> {
    /// A failing wrapper around a fresh in-memory store.
    pub fn memory() -> Self {
        Self::new(MemoryStore::new())
    }
}

fn injected() -> StoreError {
    StoreError::Unavailable("injected failure".into())
}

#[async_trait]
impl<S: RecordStore> RecordStore for FailingStore<S> {
    async fn get(&self, signer: &Address) -> sigledger::store::Result<Option<SignerRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.get(signer).await
    }

    async fn set(&self, signer: &Address, record: &SignerRecord) -> sigledger::store::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.set(signer, record).await
    }

    async fn signers(&self) -> sigledger::store::Result<Vec<Address>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.signers().await
    }
}
