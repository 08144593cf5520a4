//! Error types for the ledger.

use sigledger_core::{Address, PayloadError, SchemaError, SignatureError};
use sigledger_store::StoreError;
use thiserror::Error;

/// Why a submission was not accepted, or why the ledger could not be built.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Unknown action tag, or values that do not fit the action's schema.
    #[error("malformed payload: {0}")]
    Malformed(#[from] PayloadError),

    /// Signature did not parse or did not recover to a usable signer.
    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    /// Timestamp not strictly greater than the signer's last accepted one.
    #[error("replay from {signer}: timestamp {timestamp} is not after {last_timestamp}")]
    Replay {
        signer: Address,
        timestamp: u64,
        last_timestamp: u64,
    },

    /// The record store failed; nothing was accepted.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Invalid action registry or schema.
    #[error("configuration error: {0}")]
    Config(#[from] SchemaError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
