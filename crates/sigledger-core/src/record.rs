//! Per-signer message records.
//!
//! A [`SignerRecord`] is the unit of persistence: everything known about one
//! signer lives under one key and is written as a whole.

use serde::{Deserialize, Serialize};

use crate::crypto::{Keccak256Hash, Signature};
use crate::eip712::FieldValues;
use crate::types::Address;

/// A message that passed signature and replay checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedMessage {
    /// Action tag the message was submitted under.
    pub action: String,

    /// Replay-guard timestamp taken from the payload.
    pub timestamp: u64,

    /// Values of the declared fields, as submitted.
    pub values: FieldValues,

    /// Digest the signature was verified against.
    pub digest: Keccak256Hash,

    pub signature: Signature,
}

/// Everything recorded for one signer.
///
/// `messages` is in strictly increasing timestamp order and
/// `last_timestamp` is the timestamp of the final message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerRecord {
    /// The recovered signer identity.
    pub signer: Address,

    /// Highest accepted timestamp.
    pub last_timestamp: u64,

    /// Accepted messages, oldest first.
    pub messages: Vec<AcceptedMessage>,
}

impl SignerRecord {
    /// Create a record holding its first message.
    pub fn new(signer: Address, first: AcceptedMessage) -> Self {
        Self {
            signer,
            last_timestamp: first.timestamp,
            messages: vec![first],
        }
    }

    /// Append a message. Ordering is the caller's responsibility.
    pub fn push(&mut self, message: AcceptedMessage) {
        self.last_timestamp = self.last_timestamp.max(message.timestamp);
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Timestamp derived from the messages themselves.
    pub fn derived_last_timestamp(&self) -> Option<u64> {
        self.messages.iter().map(|m| m.timestamp).max()
    }

    /// Recompute `last_timestamp` from `messages`.
    ///
    /// Returns true if the stored value disagreed.
    pub fn reconcile(&mut self) -> bool {
        let derived = self.derived_last_timestamp().unwrap_or(0);
        let changed = derived != self.last_timestamp;
        self.last_timestamp = derived;
        changed
    }

    /// Whether timestamps strictly increase through `messages`.
    pub fn is_strictly_ordered(&self) -> bool {
        self.messages
            .windows(2)
            .all(|pair| pair[0].timestamp < pair[1].timestamp)
    }
}
