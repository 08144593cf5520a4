//! # Sigledger Testkit
//!
//! Testing utilities for sigledger.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Published EIP-712 examples with expected digests
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Test signers and a store with switchable failures
//!
//! ## Golden Vectors
//!
//! ```rust
//! use sigledger_testkit::vectors::{all_vectors, compute};
//!
//! for vector in all_vectors() {
//!     let computed = compute(&vector).unwrap();
//!     assert_eq!(computed.digest, vector.expected_digest);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sigledger_testkit::generators::{domain, message, timestamp};
//!
//! proptest! {
//!     #[test]
//!     fn digest_is_deterministic(d in domain(), values in message(timestamp())) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use sigledger::LedgerConfig;
//! use sigledger_testkit::fixtures::TestSigner;
//!
//! let config = LedgerConfig::default();
//! let signer = TestSigner::new();
//! let submission = signer.message(&config, "hi", false, 1000);
//! assert_eq!(submission.action_tag, "new-message");
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{message_values, multi_signers, FailingStore, TestSigner};
pub use vectors::{all_vectors, ether_mail, verify_all_vectors, GoldenVector};
