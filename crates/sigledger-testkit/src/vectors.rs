//! Golden test vectors for deterministic verification.
//!
//! The typed-data vectors are published examples; any EIP-712
//! implementation must reproduce them exactly.

use serde_json::{json, Value};

use sigledger::core::{
    encode_type, hash_struct, keccak256, type_hash, DigestBuilder, Domain, Keccak256Hash, Keypair,
    Signature, TypedSchema,
};

/// A typed-data signing vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    pub domain: Domain,
    pub schema: TypedSchema,
    pub message: Value,
    /// Preimage of the signer's secret key (`keccak256(seed)`).
    pub signer_seed: &'static [u8],
    pub expected_signer: &'static str,
    pub expected_encode_type: &'static str,
    pub expected_type_hash: &'static str,
    pub expected_domain_separator: &'static str,
    pub expected_struct_hash: &'static str,
    pub expected_digest: &'static str,
    /// Published `r || s || v` signature over the digest, if any.
    pub expected_signature: Option<&'static str>,
}

/// The "Ether Mail" example from EIP-712.
pub fn ether_mail() -> GoldenVector {
    let schema: TypedSchema = serde_json::from_value(json!({
        "primaryType": "Mail",
        "types": {
            "Person": [
                { "name": "name", "type": "string" },
                { "name": "wallet", "type": "address" }
            ],
            "Mail": [
                { "name": "from", "type": "Person" },
                { "name": "to", "type": "Person" },
                { "name": "contents", "type": "string" }
            ]
        }
    }))
    .expect("Ether Mail schema is valid");

    let contract = "0xCcCCccccCCCCcCCCCCCcCcCccCcCCCcCcccccccC"
        .parse()
        .expect("valid address");

    GoldenVector {
        name: "Ether Mail",
        domain: Domain::new("Ether Mail", "1")
            .with_chain_id(1)
            .with_verifying_contract(contract),
        schema,
        message: json!({
            "from": { "name": "Cow", "wallet": "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826" },
            "to": { "name": "Bob", "wallet": "0xbBbBBBBbbBBBbbbBbbBbbbbBBbBbbbbBbBbbBBbB" },
            "contents": "Hello, Bob!"
        }),
        signer_seed: b"cow",
        expected_signer: "0xCD2a3d9F938E13CD947Ec05AbC7FE734Df8DD826",
        expected_encode_type: "Mail(Person from,Person to,string contents)Person(string name,address wallet)",
        expected_type_hash: "0xa0cedeb2dc280ba39b857546d74f5549c3a1d7bdc2dd96bf881f76108e23dac2",
        expected_domain_separator: "0xf2cee375fa42b42143804025fc449deafd50cc031ca257e0b194a650a912090f",
        expected_struct_hash: "0xc52c0ee5d84264471806290a3f2c4cecfc5490626bf912d01f240d7a274b371e",
        expected_digest: "0xbe609aee343fb3c4b28e1df9e632fca64fcfaede20f02e86244efddf30957bd2",
        expected_signature: Some(concat!(
            "0x",
            "4355c47d63924e8a72e509b65029052eb6c299d53a04e167c5775fd466751c9d",
            "07299936d304c153f6443dfa05f40ff007d72911b6f72307f996231605b91562",
            "1c"
        )),
    }
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![ether_mail()]
}

/// The values computed for a vector, hex-encoded like the expectations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedVector {
    pub encode_type: String,
    pub type_hash: String,
    pub domain_separator: String,
    pub struct_hash: String,
    pub digest: String,
    pub signer: String,
}

/// Recompute every derived value of `vector`.
pub fn compute(vector: &GoldenVector) -> Result<ComputedVector, String> {
    let primary = vector.schema.primary_name();
    let values = vector
        .message
        .as_object()
        .ok_or_else(|| format!("{}: message is not an object", vector.name))?;

    let builder = DigestBuilder::new(vector.domain.clone());
    let digest = builder
        .digest(&vector.schema, values)
        .map_err(|e| e.to_string())?;
    let keypair = signer(vector)?;

    Ok(ComputedVector {
        encode_type: encode_type(&vector.schema, primary).map_err(|e| e.to_string())?,
        type_hash: type_hash(&vector.schema, primary)
            .map_err(|e| e.to_string())?
            .to_string(),
        domain_separator: builder.domain_separator().to_string(),
        struct_hash: hash_struct(&vector.schema, primary, &vector.message)
            .map_err(|e| e.to_string())?
            .to_string(),
        digest: digest.to_string(),
        signer: keypair.address().to_string(),
    })
}

/// The vector's signing key.
pub fn signer(vector: &GoldenVector) -> Result<Keypair, String> {
    let secret: Keccak256Hash = keccak256(vector.signer_seed);
    Keypair::from_secret_bytes(&secret.0).map_err(|e| e.to_string())
}

/// Verify a vector, returning a description of the first mismatch.
pub fn verify_vector(vector: &GoldenVector) -> Result<(), String> {
    let computed = compute(vector)?;
    let checks = [
        ("encodeType", vector.expected_encode_type, computed.encode_type.as_str()),
        ("typeHash", vector.expected_type_hash, computed.type_hash.as_str()),
        ("domainSeparator", vector.expected_domain_separator, computed.domain_separator.as_str()),
        ("hashStruct", vector.expected_struct_hash, computed.struct_hash.as_str()),
        ("digest", vector.expected_digest, computed.digest.as_str()),
        ("signer", vector.expected_signer, computed.signer.as_str()),
    ];
    for (what, expected, got) in checks {
        if expected != got {
            return Err(format!("{} {}: expected {}, got {}", vector.name, what, expected, got));
        }
    }

    if let Some(sig_hex) = vector.expected_signature {
        let signature = Signature::from_hex(sig_hex).map_err(|e| e.to_string())?;
        let digest = vector
            .expected_digest
            .parse::<Keccak256Hash>()
            .map_err(|e| e.to_string())?;
        let recovered = signature.recover(&digest).map_err(|e| e.to_string())?;
        if recovered.to_string() != vector.expected_signer {
            return Err(format!(
                "{} signature recovers to {}, expected {}",
                vector.name, recovered, vector.expected_signer
            ));
        }
    }
    Ok(())
}

/// Verify all golden vectors.
pub fn verify_all_vectors() -> Result<(), String> {
    all_vectors().iter().try_for_each(verify_vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ether_mail_vector() {
        verify_vector(&ether_mail()).unwrap();
    }

    #[test]
    fn test_altered_message_fails_vector() {
        let mut vector = ether_mail();
        vector.message["contents"] = json!("Hello, Alice!");
        assert!(verify_vector(&vector).is_err());
    }
}
