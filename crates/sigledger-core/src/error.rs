//! Error types for the Sigledger core.

use thiserror::Error;

use crate::types::Address;

/// Errors raised while encoding field values into a typed-data digest.
///
/// Every variant means the submitted payload does not match the shape its
/// type descriptor declares.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("payload for {0} must be a JSON object")]
    NotAnObject(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("field {field} is not a valid {ty}: {reason}")]
    InvalidValue {
        field: String,
        ty: String,
        reason: String,
    },

    #[error("field {field} has {got} elements, expected {expected}")]
    ArrayLength {
        field: String,
        expected: usize,
        got: usize,
    },

    #[error("unknown struct type: {0}")]
    UnknownType(String),

    #[error("unknown action tag: {0}")]
    UnknownAction(String),
}

impl PayloadError {
    pub(crate) fn invalid(field: &str, ty: impl ToString, reason: impl Into<String>) -> Self {
        PayloadError::InvalidValue {
            field: field.to_string(),
            ty: ty.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while parsing a signature or recovering its signer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature must be 65 bytes, got {0}")]
    InvalidLength(usize),

    #[error("signature is not valid hex: {0}")]
    InvalidHex(String),

    #[error("signature component {0} is out of range")]
    ComponentOutOfRange(&'static str),

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("recovered the zero address")]
    ZeroAddress,

    #[error("signature recovers to {recovered}, not the claimed {claimed}")]
    SignerMismatch { claimed: Address, recovered: Address },

    #[error("invalid secret key")]
    InvalidSecretKey,
}

/// Errors in a type descriptor or domain definition.
///
/// These are configuration errors, detected once when a schema is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("invalid field type: {0}")]
    InvalidType(String),

    #[error("type {owner} references undefined struct type {missing}")]
    UndefinedType { owner: String, missing: String },

    #[error("primary type {0} is not defined")]
    MissingPrimaryType(String),

    #[error("type {owner} declares field {field} more than once")]
    DuplicateField { owner: String, field: String },

    #[error("invalid type name: {0}")]
    InvalidTypeName(String),

    #[error("timestamp field {field} of {owner}: {reason}")]
    TimestampField {
        owner: String,
        field: String,
        reason: String,
    },
}

/// Errors parsing an address from text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AddressError {
    #[error("address must be 0x-prefixed")]
    MissingPrefix,

    #[error("address must be 20 bytes")]
    InvalidLength,

    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}
