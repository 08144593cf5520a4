//! # Sigledger
//!
//! A replay-protected ledger of EIP-712 signed messages.
//!
//! ## Overview
//!
//! Clients sign structured payloads in their wallets. Sigledger recovers the
//! signer from each submission, rejects anything whose timestamp does not
//! move strictly forward for that signer, and appends the rest to the
//! signer's history.
//!
//! ## Key Concepts
//!
//! - **Action**: a tag selecting the typed schema a payload is signed under.
//! - **Domain**: the context mixed into every digest, so signatures cannot
//!   be moved between deployments.
//! - **Replay**: a submission whose timestamp is not after the signer's
//!   last accepted one.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sigledger::{AcceptanceCoordinator, LedgerConfig, Outcome, Submission};
//! use sigledger::store::SqliteStore;
//!
//! async fn example(submission: Submission) {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!     let coordinator = AcceptanceCoordinator::new(LedgerConfig::default(), store);
//!
//!     match coordinator.submit(&submission).await {
//!         Outcome::Accepted(a) => println!("message {} from {}", a.index, a.signer),
//!         other => println!("rejected: {}", other.kind()),
//!     }
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `sigledger::core` - digests, signatures, addresses, records
//! - `sigledger::store` - record persistence

pub mod acceptor;
pub mod config;
pub mod error;
pub mod guard;
pub mod ledger;

// Re-export component crates
pub use sigledger_core as core;
pub use sigledger_store as store;

pub use acceptor::{Acceptance, AcceptanceCoordinator, Outcome, Submission};
pub use config::{ActionRegistry, ActionSpec, LedgerConfig, DEFAULT_ACTION, DEFAULT_TIMESTAMP_FIELD};
pub use error::{LedgerError, Result};
pub use guard::{ReplayDecision, ReplayGuard, SignerLock};
pub use ledger::{Appended, MessageLedger};

// Re-export commonly used core types
pub use sigledger_core::{
    Address, Domain, FieldValues, Keccak256Hash, Keypair, Signature, SignerRecord, TypedSchema,
};
