//! # Sigledger Store
//!
//! Persistence for per-signer message records. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`RecordStore`] - The async trait for record persistence
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sigledger_store::{RecordStore, SqliteStore};
//! use sigledger_core::Address;
//!
//! async fn example(signer: Address) {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!     if let Some(record) = store.get(&signer).await.unwrap() {
//!         println!("{} messages", record.len());
//!     }
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Whole-record writes**: `set` replaces a signer's record in one
//!   statement, so a reader never sees a partially applied append.
//! - **Serialization of appends** is the caller's job; stores do not lock
//!   across a get/set pair.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::RecordStore;
