//! # Sigledger Core
//!
//! Pure primitives for Sigledger: typed-data digests, signer recovery, and
//! per-signer message records.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`DigestBuilder`] - EIP-712 digest of a typed payload under a fixed [`Domain`]
//! - [`TypedSchema`] - A primary [`TypeDescriptor`] and the struct types it references
//! - [`Signature`] - 65-byte recoverable secp256k1 signature
//! - [`Address`] - Signer identity recovered from a signature
//! - [`SignerRecord`] - Everything accepted from one signer
//!
//! ## Digests
//!
//! Digests follow EIP-712 so that wallets can sign payloads with
//! `eth_signTypedData`. See the [`eip712`] module.

pub mod crypto;
pub mod eip712;
pub mod error;
pub mod record;
pub mod typed;
pub mod types;
pub mod word;

pub use crypto::{address_of, keccak256, recover_signer, Keccak256Hash, Keypair, Signature};
pub use eip712::{domain_separator, encode_type, hash_struct, type_hash, DigestBuilder, FieldValues};
pub use error::{AddressError, PayloadError, SchemaError, SignatureError};
pub use record::{AcceptedMessage, SignerRecord};
pub use typed::{Domain, FieldSpec, FieldType, TypeDescriptor, TypedSchema};
pub use types::Address;
