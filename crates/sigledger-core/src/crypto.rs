//! Cryptographic primitives for Sigledger.
//!
//! Wraps Keccak-256 hashing and recoverable secp256k1 ECDSA with strong
//! types. Signatures use the 65-byte `r || s || v` wire form that wallets
//! emit for typed-data signing.

use alloy_primitives::B256;
use secp256k1::constants::CURVE_ORDER;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::SignatureError;
use crate::types::Address;

pub use alloy_primitives::keccak256;

/// A 32-byte Keccak-256 hash. Displays as `0x`-prefixed lowercase hex.
pub type Keccak256Hash = B256;

/// A recoverable ECDSA signature: two curve scalars plus a recovery id.
///
/// Parsing is strict. `r` and `s` must lie in `[1, n)` and `v` must be
/// `0`, `1`, `27` or `28`. Nothing is normalized.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
    /// Raw recovery id, 0 or 1.
    v: u8,
}

impl Signature {
    /// Length of the wire encoding.
    pub const LEN: usize = 65;

    /// Parse the 65-byte `r || s || v` encoding.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != Self::LEN {
            return Err(SignatureError::InvalidLength(bytes.len()));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);

        if !in_scalar_range(&r) {
            return Err(SignatureError::ComponentOutOfRange("r"));
        }
        if !in_scalar_range(&s) {
            return Err(SignatureError::ComponentOutOfRange("s"));
        }

        let v = match bytes[64] {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - 27,
            other => return Err(SignatureError::InvalidRecoveryId(other)),
        };

        Ok(Self { r, s, v })
    }

    /// Parse a `0x`-prefixed hex signature.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| SignatureError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Wire encoding with `v` in the `27 + id` form.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v + 27;
        out
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// The recovery id (0 or 1).
    pub fn recovery_id(&self) -> u8 {
        self.v
    }

    /// Recover the address that produced this signature over `digest`.
    pub fn recover(&self, digest: &Keccak256Hash) -> Result<Address, SignatureError> {
        let rec_id = RecoveryId::from_i32(i32::from(self.v))
            .map_err(|_| SignatureError::InvalidRecoveryId(self.v))?;

        let mut compact = [0u8; 64];
        compact[..32].copy_from_slice(&self.r);
        compact[32..].copy_from_slice(&self.s);
        let sig = RecoverableSignature::from_compact(&compact, rec_id)
            .map_err(|_| SignatureError::RecoveryFailed)?;

        let message = Message::from_digest(digest.0);
        let public_key = SECP256K1
            .recover_ecdsa(&message, &sig)
            .map_err(|_| SignatureError::RecoveryFailed)?;

        let address = address_of(&public_key);
        if address.is_zero() {
            return Err(SignatureError::ZeroAddress);
        }
        Ok(address)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..18])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Recover the signer of `digest` from raw signature bytes.
pub fn recover_signer(digest: &Keccak256Hash, signature: &[u8]) -> Result<Address, SignatureError> {
    Signature::from_slice(signature)?.recover(digest)
}

/// Derive the account address of a public key.
pub fn address_of(public_key: &PublicKey) -> Address {
    let uncompressed = public_key.serialize_uncompressed();
    let hash = keccak256(&uncompressed[1..]);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash[12..]);
    Address(out)
}

fn in_scalar_range(scalar: &[u8; 32]) -> bool {
    // Big-endian byte arrays compare numerically.
    *scalar != [0u8; 32] && *scalar < CURVE_ORDER
}

/// A secp256k1 keypair for signing digests.
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
}

impl Keypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            secret: SecretKey::new(&mut rng),
        }
    }

    /// Create from 32 bytes of secret key material.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, SignatureError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| SignatureError::InvalidSecretKey)?;
        Ok(Self { secret })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_secret_key(SECP256K1, &self.secret)
    }

    pub fn address(&self) -> Address {
        address_of(&self.public_key())
    }

    /// Sign a 32-byte digest.
    pub fn sign_digest(&self, digest: &Keccak256Hash) -> Signature {
        let message = Message::from_digest(digest.0);
        let sig = SECP256K1.sign_ecdsa_recoverable(&message, &self.secret);
        let (rec_id, compact) = sig.serialize_compact();

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        s.copy_from_slice(&compact[32..]);

        Signature {
            r,
            s,
            // Ids 2 and 3 need an r above the group order; signing does not
            // produce them.
            v: (rec_id.to_i32() & 1) as u8,
        }
    }

    /// Get the raw secret key bytes.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.secret_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_empty_input() {
        assert_eq!(
            keccak256(b"").to_string(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_sign_recover() {
        let keypair = Keypair::generate();
        let digest = keccak256(b"hello world");
        let signature = keypair.sign_digest(&digest);

        let signer = signature.recover(&digest).unwrap();
        assert_eq!(signer, keypair.address());

        // A different digest recovers someone else (or nobody).
        let other = keccak256(b"hello worlD");
        assert_ne!(signature.recover(&other).ok(), Some(keypair.address()));
    }

    #[test]
    fn test_wire_encoding_uses_27_offset() {
        let keypair = Keypair::generate();
        let digest = keccak256(b"wire");
        let bytes = keypair.sign_digest(&digest).to_bytes();
        assert!(bytes[64] == 27 || bytes[64] == 28);

        let parsed = Signature::from_slice(&bytes).unwrap();
        assert_eq!(recover_signer(&digest, &bytes).unwrap(), keypair.address());

        // Raw 0/1 form is the same discriminant.
        let mut raw = bytes;
        raw[64] -= 27;
        assert_eq!(Signature::from_slice(&raw).unwrap(), parsed);
    }

    #[test]
    fn test_rejects_bad_length() {
        assert_eq!(
            Signature::from_slice(&[1u8; 64]),
            Err(SignatureError::InvalidLength(64))
        );
    }

    #[test]
    fn test_rejects_bad_recovery_id() {
        let keypair = Keypair::generate();
        let mut bytes = keypair.sign_digest(&keccak256(b"v")).to_bytes();
        for v in [2u8, 3, 26, 29, 37] {
            bytes[64] = v;
            assert_eq!(
                Signature::from_slice(&bytes),
                Err(SignatureError::InvalidRecoveryId(v))
            );
        }
    }

    #[test]
    fn test_rejects_out_of_range_components() {
        let keypair = Keypair::generate();
        let good = keypair.sign_digest(&keccak256(b"range")).to_bytes();

        let mut zero_r = good;
        zero_r[..32].copy_from_slice(&[0u8; 32]);
        assert_eq!(
            Signature::from_slice(&zero_r),
            Err(SignatureError::ComponentOutOfRange("r"))
        );

        let mut order_s = good;
        order_s[32..64].copy_from_slice(&CURVE_ORDER);
        assert_eq!(
            Signature::from_slice(&order_s),
            Err(SignatureError::ComponentOutOfRange("s"))
        );
    }

    #[test]
    fn test_known_key_address() {
        // The EIP-712 reference key: keccak256("cow").
        let secret = keccak256(b"cow");
        let keypair = Keypair::from_secret_bytes(&secret.0).unwrap();
        assert_eq!(
            keypair.address().to_checksum(),
            "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let keypair = Keypair::generate();
        let sig = keypair.sign_digest(&keccak256(b"hex"));
        assert_eq!(Signature::from_hex(&sig.to_hex()).unwrap(), sig);
        assert!(matches!(
            Signature::from_hex("0xnothex"),
            Err(SignatureError::InvalidHex(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_recover_returns_signing_key(seed in proptest::array::uniform32(1u8..), data in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let keypair = Keypair::from_secret_bytes(&seed).unwrap();
            let digest = keccak256(&data);
            let signature = keypair.sign_digest(&digest);
            proptest::prop_assert_eq!(signature.recover(&digest).unwrap(), keypair.address());
        }
    }
}
