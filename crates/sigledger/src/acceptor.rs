//! The acceptance coordinator: one signed submission in, one outcome out.
//!
//! ```text
//! action tag -> schema -> digest -> recovered signer
//!            -> [signer lock: replay check -> ledger append -> advance]
//! ```
//!
//! The guard is advanced only after the ledger write succeeds, so a storage
//! failure never leaves the guard ahead of what was persisted.

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use sigledger_core::{
    AcceptedMessage, Address, DigestBuilder, FieldValues, Keccak256Hash, PayloadError, Signature,
    SignatureError, SignerRecord,
};
use sigledger_store::{RecordStore, StoreError};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, Result};
use crate::guard::{ReplayDecision, ReplayGuard};
use crate::ledger::{Appended, MessageLedger};

/// A signed payload as received from a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Selects the schema the values were signed under.
    pub action_tag: String,
    /// Field values of the action's primary type.
    pub values: FieldValues,
    /// Raw 65-byte `r || s || v` signature; `0x` hex in JSON.
    #[serde(with = "hex_bytes")]
    pub signature: Bytes,
    /// Address the client claims signed. Checked against the recovered one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer: Option<Address>,
}

impl Submission {
    pub fn new(action_tag: impl Into<String>, values: FieldValues, signature: impl Into<Bytes>) -> Self {
        Self {
            action_tag: action_tag.into(),
            values,
            signature: signature.into(),
            signer: None,
        }
    }

    /// Claim `signer` as the author.
    pub fn with_signer(mut self, signer: Address) -> Self {
        self.signer = Some(signer);
        self
    }
}

mod hex_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Bytes, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(digits)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

/// An accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    pub signer: Address,
    pub timestamp: u64,
    pub digest: Keccak256Hash,
    /// Position of the message in the signer's history.
    pub index: usize,
}

/// Terminal state of a submission.
#[derive(Debug)]
pub enum Outcome {
    Accepted(Acceptance),
    RejectedMalformed(PayloadError),
    RejectedSignature(SignatureError),
    RejectedReplay {
        signer: Address,
        timestamp: u64,
        last_timestamp: u64,
    },
    Failed(StoreError),
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Accepted(_) => "accepted",
            Outcome::RejectedMalformed(_) => "malformed",
            Outcome::RejectedSignature(_) => "invalid_signature",
            Outcome::RejectedReplay { .. } => "replay",
            Outcome::Failed(_) => "storage_failure",
        }
    }

    pub fn into_result(self) -> Result<Acceptance> {
        match self {
            Outcome::Accepted(acceptance) => Ok(acceptance),
            Outcome::RejectedMalformed(e) => Err(LedgerError::Malformed(e)),
            Outcome::RejectedSignature(e) => Err(LedgerError::InvalidSignature(e)),
            Outcome::RejectedReplay {
                signer,
                timestamp,
                last_timestamp,
            } => Err(LedgerError::Replay {
                signer,
                timestamp,
                last_timestamp,
            }),
            Outcome::Failed(e) => Err(LedgerError::Storage(e)),
        }
    }
}

/// Verifies signed submissions and records the accepted ones.
///
/// Safe to share across tasks; submissions from different signers run in
/// parallel, submissions from the same signer are serialized.
pub struct AcceptanceCoordinator<S: RecordStore> {
    config: LedgerConfig,
    digests: DigestBuilder,
    guard: ReplayGuard,
    ledger: MessageLedger<S>,
}

impl<S: RecordStore> AcceptanceCoordinator<S> {
    pub fn new(config: LedgerConfig, store: S) -> Self {
        Self {
            digests: DigestBuilder::new(config.domain.clone()),
            config,
            guard: ReplayGuard::new(),
            ledger: MessageLedger::new(store),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn domain_separator(&self) -> &Keccak256Hash {
        self.digests.domain_separator()
    }

    pub fn ledger(&self) -> &MessageLedger<S> {
        &self.ledger
    }

    /// Digest a client must sign for `values` under `action_tag`.
    pub fn digest(&self, action_tag: &str, values: &FieldValues) -> Result<Keccak256Hash> {
        let action = self
            .config
            .actions
            .get(action_tag)
            .ok_or_else(|| PayloadError::UnknownAction(action_tag.to_string()))?;
        Ok(self.digests.digest(action.schema(), values)?)
    }

    /// Process one submission to a terminal outcome. Never retries.
    pub async fn submit(&self, submission: &Submission) -> Outcome {
        let outcome = self.process(submission).await;
        match &outcome {
            Outcome::Accepted(a) => tracing::debug!(
                action = %submission.action_tag,
                signer = %a.signer,
                timestamp = a.timestamp,
                index = a.index,
                "accepted submission"
            ),
            Outcome::RejectedMalformed(e) => tracing::info!(
                action = %submission.action_tag,
                error = %e,
                "rejected malformed submission"
            ),
            Outcome::RejectedSignature(e) => tracing::info!(
                action = %submission.action_tag,
                error = %e,
                "rejected submission with invalid signature"
            ),
            Outcome::RejectedReplay {
                signer,
                timestamp,
                last_timestamp,
            } => tracing::info!(
                action = %submission.action_tag,
                signer = %signer,
                timestamp,
                last_timestamp,
                "rejected replayed submission"
            ),
            Outcome::Failed(e) => tracing::warn!(
                action = %submission.action_tag,
                error = %e,
                "submission failed on storage"
            ),
        }
        outcome
    }

    async fn process(&self, submission: &Submission) -> Outcome {
        let Some(action) = self.config.actions.get(&submission.action_tag) else {
            return Outcome::RejectedMalformed(PayloadError::UnknownAction(
                submission.action_tag.clone(),
            ));
        };

        let digest = match self.digests.digest(action.schema(), &submission.values) {
            Ok(digest) => digest,
            Err(e) => return Outcome::RejectedMalformed(e),
        };
        let timestamp = match action.timestamp(&submission.values) {
            Ok(timestamp) => timestamp,
            Err(e) => return Outcome::RejectedMalformed(e),
        };

        let signature = match Signature::from_slice(&submission.signature) {
            Ok(signature) => signature,
            Err(e) => return Outcome::RejectedSignature(e),
        };
        let signer = match signature.recover(&digest) {
            Ok(signer) => signer,
            Err(e) => return Outcome::RejectedSignature(e),
        };
        if let Some(claimed) = submission.signer {
            if claimed != signer {
                return Outcome::RejectedSignature(SignatureError::SignerMismatch {
                    claimed,
                    recovered: signer,
                });
            }
        }

        let mut lock = self.guard.lock(signer).await;
        if !lock.is_hydrated() {
            match self.ledger.get(&signer).await {
                Ok(record) => lock.hydrate(record.map(|r| r.last_timestamp)),
                Err(e) => return Outcome::Failed(e),
            }
        }

        if let ReplayDecision::Rejected { last_timestamp } = lock.check(timestamp) {
            return Outcome::RejectedReplay {
                signer,
                timestamp,
                last_timestamp,
            };
        }

        let message = AcceptedMessage {
            action: submission.action_tag.clone(),
            timestamp,
            values: action.declared_values(&submission.values),
            digest,
            signature,
        };
        // The cached slot only short-circuits; the record read for the write
        // decides, since another writer may share the store.
        let index = match self.ledger.append(&signer, message).await {
            Ok(Appended::At(index)) => index,
            Ok(Appended::Stale { last_timestamp }) => {
                lock.hydrate(Some(last_timestamp));
                return Outcome::RejectedReplay {
                    signer,
                    timestamp,
                    last_timestamp,
                };
            }
            Err(e) => return Outcome::Failed(e),
        };
        lock.advance(timestamp);

        Outcome::Accepted(Acceptance {
            signer,
            timestamp,
            digest,
            index,
        })
    }

    /// The current record for `signer`.
    pub async fn record(&self, signer: &Address) -> Result<Option<SignerRecord>> {
        Ok(self.ledger.get(signer).await?)
    }

    /// Every signer with at least one accepted message.
    pub async fn signers(&self) -> Result<Vec<Address>> {
        Ok(self.ledger.signers().await?)
    }
}
