//! Message ledger: the ordered list of accepted messages per signer.
//!
//! A read-modify-write layer over a [`RecordStore`]. The stored record is
//! the authority on ordering: `append` refuses a message whose timestamp is
//! not past the record it read, even when some other writer sharing the
//! store put it there. Callers hold that signer's lock around the append.

use sigledger_core::{AcceptedMessage, Address, SignerRecord};
use sigledger_store::{RecordStore, Result};

/// What [`MessageLedger::append`] did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// Stored at this index of the signer's history.
    At(usize),
    /// Not stored: the record already reaches `last_timestamp`.
    Stale { last_timestamp: u64 },
}

/// Append-only per-signer message history.
pub struct MessageLedger<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> MessageLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append `message` to `signer`'s history.
    ///
    /// Creates the record on first use. A message at or before the record's
    /// last timestamp is not written and comes back as [`Appended::Stale`].
    /// The whole record is written in one `set`; on error nothing is recorded.
    pub async fn append(&self, signer: &Address, message: AcceptedMessage) -> Result<Appended> {
        let record = match self.store.get(signer).await? {
            Some(mut record) => {
                if record.reconcile() {
                    tracing::warn!(signer = %signer, "stored last timestamp disagreed with messages");
                }
                if !record.is_empty() && message.timestamp <= record.last_timestamp {
                    return Ok(Appended::Stale {
                        last_timestamp: record.last_timestamp,
                    });
                }
                record.push(message);
                record
            }
            None => SignerRecord::new(*signer, message),
        };

        self.store.set(signer, &record).await?;
        Ok(Appended::At(record.len() - 1))
    }

    /// The signer's record, with `last_timestamp` recomputed from its messages.
    pub async fn get(&self, signer: &Address) -> Result<Option<SignerRecord>> {
        Ok(self.store.get(signer).await?.map(|mut record| {
            record.reconcile();
            record
        }))
    }

    /// Every signer with a record.
    pub async fn signers(&self) -> Result<Vec<Address>> {
        self.store.signers().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sigledger_core::{keccak256, Keypair};
    use sigledger_store::MemoryStore;

    fn message(keypair: &Keypair, timestamp: u64) -> AcceptedMessage {
        let digest = keccak256(&timestamp.to_be_bytes());
        AcceptedMessage {
            action: "new-message".into(),
            timestamp,
            values: json!({ "message": "hi", "urgent": false, "timestamp": timestamp })
                .as_object()
                .cloned()
                .unwrap(),
            digest,
            signature: keypair.sign_digest(&digest),
        }
    }

    #[tokio::test]
    async fn test_append_creates_then_extends() {
        let ledger = MessageLedger::new(MemoryStore::new());
        let keypair = Keypair::generate();
        let signer = keypair.address();

        assert!(ledger.get(&signer).await.unwrap().is_none());
        assert_eq!(
            ledger.append(&signer, message(&keypair, 10)).await.unwrap(),
            Appended::At(0)
        );
        assert_eq!(
            ledger.append(&signer, message(&keypair, 20)).await.unwrap(),
            Appended::At(1)
        );

        let record = ledger.get(&signer).await.unwrap().unwrap();
        assert_eq!(record.signer, signer);
        assert_eq!(record.last_timestamp, 20);
        let timestamps: Vec<u64> = record.messages.iter().map(|m| m.timestamp).collect();
        assert_eq!(timestamps, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_append_refuses_stale_message() {
        let ledger = MessageLedger::new(MemoryStore::new());
        let keypair = Keypair::generate();
        let signer = keypair.address();

        ledger.append(&signer, message(&keypair, 42)).await.unwrap();
        for timestamp in [42, 41, 1] {
            assert_eq!(
                ledger.append(&signer, message(&keypair, timestamp)).await.unwrap(),
                Appended::Stale { last_timestamp: 42 }
            );
        }

        let record = ledger.get(&signer).await.unwrap().unwrap();
        assert_eq!(record.len(), 1);
        assert!(record.is_strictly_ordered());
    }

    #[tokio::test]
    async fn test_append_orders_against_messages_not_stored_timestamp() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();
        let signer = keypair.address();

        // A stale stored timestamp must neither block nor admit messages.
        let mut record = SignerRecord::new(signer, message(&keypair, 10));
        record.last_timestamp = 500;
        store.set(&signer, &record).await.unwrap();

        let ledger = MessageLedger::new(store);
        assert_eq!(
            ledger.append(&signer, message(&keypair, 10)).await.unwrap(),
            Appended::Stale { last_timestamp: 10 }
        );
        assert_eq!(
            ledger.append(&signer, message(&keypair, 11)).await.unwrap(),
            Appended::At(1)
        );
    }

    #[tokio::test]
    async fn test_get_reconciles_stale_timestamp() {
        let store = MemoryStore::new();
        let keypair = Keypair::generate();
        let signer = keypair.address();

        let mut record = SignerRecord::new(signer, message(&keypair, 10));
        record.last_timestamp = 500;
        store.set(&signer, &record).await.unwrap();

        let ledger = MessageLedger::new(store);
        assert_eq!(ledger.get(&signer).await.unwrap().unwrap().last_timestamp, 10);
    }

    #[tokio::test]
    async fn test_lists_signers() {
        let ledger = MessageLedger::new(MemoryStore::new());
        let keypair = Keypair::generate();
        ledger.append(&keypair.address(), message(&keypair, 1)).await.unwrap();
        assert_eq!(ledger.signers().await.unwrap(), vec![keypair.address()]);
    }
}
