//! EIP-712 typed structured data hashing.
//!
//! ```text
//! digest      = keccak256(0x19 0x01 || domainSeparator || hashStruct(message))
//! hashStruct  = keccak256(typeHash || enc(field_1) || ... || enc(field_n))
//! typeHash    = keccak256(encodeType(T))
//! ```
//!
//! `encodeType(T)` is `T(type1 name1,...)` followed by every struct type
//! reachable from `T`, sorted by name. Each field encodes to one 32-byte
//! word: atomic values directly, `string`/`bytes` as the hash of their
//! contents, structs as their `hashStruct`, arrays as the hash of the
//! concatenated element encodings.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

use crate::crypto::{keccak256, Keccak256Hash};
use crate::error::PayloadError;
use crate::typed::{Domain, FieldType, TypedSchema};
use crate::types::Address;
use crate::word::{parse_int, parse_uint, word_from_u64, Word};

/// Field values of a typed payload.
pub type FieldValues = Map<String, Value>;

/// Prefix that makes the signed bytes invalid as an RLP transaction.
pub const DIGEST_PREFIX: [u8; 2] = [0x19, 0x01];

/// Computes digests of typed payloads under one fixed domain.
///
/// The domain separator is hashed once at construction.
#[derive(Debug, Clone)]
pub struct DigestBuilder {
    domain: Domain,
    separator: Keccak256Hash,
}

impl DigestBuilder {
    pub fn new(domain: Domain) -> Self {
        let separator = domain_separator(&domain);
        Self { domain, separator }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn domain_separator(&self) -> &Keccak256Hash {
        &self.separator
    }

    /// Digest of `values` as an instance of the schema's primary type.
    pub fn digest(
        &self,
        schema: &TypedSchema,
        values: &FieldValues,
    ) -> Result<Keccak256Hash, PayloadError> {
        let message = hash_values(schema, schema.primary_name(), values, schema.primary_name())?;
        Ok(signing_digest(&self.separator, &message))
    }
}

/// `keccak256(0x19 0x01 || separator || struct_hash)`
pub fn signing_digest(separator: &Keccak256Hash, struct_hash: &Keccak256Hash) -> Keccak256Hash {
    let mut buf = Vec::with_capacity(66);
    buf.extend_from_slice(&DIGEST_PREFIX);
    buf.extend_from_slice(separator.as_slice());
    buf.extend_from_slice(struct_hash.as_slice());
    keccak256(&buf)
}

/// `hashStruct(EIP712Domain, domain)`
pub fn domain_separator(domain: &Domain) -> Keccak256Hash {
    let descriptor = domain.descriptor();
    let mut buf = Vec::with_capacity(32 * (descriptor.fields.len() + 1));
    buf.extend_from_slice(keccak256(descriptor.encode().as_bytes()).as_slice());

    if let Some(name) = &domain.name {
        buf.extend_from_slice(keccak256(name.as_bytes()).as_slice());
    }
    if let Some(version) = &domain.version {
        buf.extend_from_slice(keccak256(version.as_bytes()).as_slice());
    }
    if let Some(chain_id) = domain.chain_id {
        buf.extend_from_slice(&word_from_u64(chain_id));
    }
    if let Some(contract) = &domain.verifying_contract {
        buf.extend_from_slice(&contract.to_word());
    }
    if let Some(salt) = &domain.salt {
        buf.extend_from_slice(salt.as_slice());
    }
    keccak256(&buf)
}

/// `encodeType(name)` within `schema`.
pub fn encode_type(schema: &TypedSchema, name: &str) -> Result<String, PayloadError> {
    let primary = schema
        .get(name)
        .ok_or_else(|| PayloadError::UnknownType(name.to_string()))?;

    let mut deps = BTreeSet::new();
    collect_dependencies(schema, name, &mut deps);
    deps.remove(name);

    let mut out = primary.encode();
    for dep in deps {
        if let Some(descriptor) = schema.get(dep) {
            out.push_str(&descriptor.encode());
        }
    }
    Ok(out)
}

/// `typeHash(name)` within `schema`.
pub fn type_hash(schema: &TypedSchema, name: &str) -> Result<Keccak256Hash, PayloadError> {
    Ok(keccak256(encode_type(schema, name)?.as_bytes()))
}

/// `hashStruct(name, value)` within `schema`.
pub fn hash_struct(
    schema: &TypedSchema,
    name: &str,
    value: &Value,
) -> Result<Keccak256Hash, PayloadError> {
    let values = value
        .as_object()
        .ok_or_else(|| PayloadError::NotAnObject(name.to_string()))?;
    hash_values(schema, name, values, name)
}

fn collect_dependencies<'a>(schema: &'a TypedSchema, name: &'a str, deps: &mut BTreeSet<&'a str>) {
    if !deps.insert(name) {
        return;
    }
    if let Some(descriptor) = schema.get(name) {
        for field in &descriptor.fields {
            if let Some(dep) = field.ty.struct_name() {
                collect_dependencies(schema, dep, deps);
            }
        }
    }
}

fn hash_values(
    schema: &TypedSchema,
    name: &str,
    values: &FieldValues,
    path: &str,
) -> Result<Keccak256Hash, PayloadError> {
    let descriptor = schema
        .get(name)
        .ok_or_else(|| PayloadError::UnknownType(name.to_string()))?;

    let mut buf = Vec::with_capacity(32 * (descriptor.fields.len() + 1));
    buf.extend_from_slice(type_hash(schema, name)?.as_slice());

    for field in &descriptor.fields {
        let field_path = format!("{}.{}", path, field.name);
        let value = values
            .get(&field.name)
            .ok_or_else(|| PayloadError::MissingField(field_path.clone()))?;
        buf.extend_from_slice(&encode_value(schema, &field.ty, value, &field_path)?);
    }

    Ok(keccak256(&buf))
}

fn encode_value(
    schema: &TypedSchema,
    ty: &FieldType,
    value: &Value,
    path: &str,
) -> Result<Word, PayloadError> {
    let mut word = [0u8; 32];
    match ty {
        FieldType::Bool => {
            let b = value
                .as_bool()
                .ok_or_else(|| PayloadError::invalid(path, ty, "expected true or false"))?;
            word[31] = u8::from(b);
        }
        FieldType::Address => {
            let s = value
                .as_str()
                .ok_or_else(|| PayloadError::invalid(path, ty, "expected a hex string"))?;
            let address =
                Address::from_hex(s).map_err(|e| PayloadError::invalid(path, ty, e.to_string()))?;
            word = address.to_word();
        }
        FieldType::String => {
            let s = value
                .as_str()
                .ok_or_else(|| PayloadError::invalid(path, ty, "expected a string"))?;
            word = keccak256(s.as_bytes()).0;
        }
        FieldType::Bytes => {
            let bytes = decode_hex_value(value).map_err(|e| PayloadError::invalid(path, ty, e))?;
            word = keccak256(&bytes).0;
        }
        FieldType::FixedBytes(len) => {
            let bytes = decode_hex_value(value).map_err(|e| PayloadError::invalid(path, ty, e))?;
            if bytes.len() != usize::from(*len) {
                return Err(PayloadError::invalid(
                    path,
                    ty,
                    format!("expected {} bytes, got {}", len, bytes.len()),
                ));
            }
            word[..bytes.len()].copy_from_slice(&bytes);
        }
        FieldType::Uint(bits) => {
            word = parse_uint(value, *bits).map_err(|e| PayloadError::invalid(path, ty, e))?;
        }
        FieldType::Int(bits) => {
            word = parse_int(value, *bits).map_err(|e| PayloadError::invalid(path, ty, e))?;
        }
        FieldType::Struct(name) => {
            let values = value
                .as_object()
                .ok_or_else(|| PayloadError::NotAnObject(path.to_string()))?;
            word = hash_values(schema, name, values, path)?.0;
        }
        FieldType::Array(inner, len) => {
            let items = value
                .as_array()
                .ok_or_else(|| PayloadError::invalid(path, ty, "expected an array"))?;
            if let Some(expected) = len {
                if items.len() != *expected {
                    return Err(PayloadError::ArrayLength {
                        field: path.to_string(),
                        expected: *expected,
                        got: items.len(),
                    });
                }
            }
            let mut buf = Vec::with_capacity(32 * items.len());
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                buf.extend_from_slice(&encode_value(schema, inner, item, &item_path)?);
            }
            word = keccak256(&buf).0;
        }
    }
    Ok(word)
}

fn decode_hex_value(value: &Value) -> Result<Vec<u8>, String> {
    let s = value.as_str().ok_or("expected a hex string")?;
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or("hex string must be 0x-prefixed")?;
    hex::decode(digits).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::TypeDescriptor;
    use serde_json::json;

    fn message_schema() -> TypedSchema {
        TypedSchema::single(
            TypeDescriptor::parse(
                "MessageData",
                &[("message", "string"), ("urgent", "bool"), ("timestamp", "uint256")],
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn values(message: &str, urgent: bool, timestamp: u64) -> FieldValues {
        json!({ "message": message, "urgent": urgent, "timestamp": timestamp })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn test_domain_type_hash() {
        let domain = Domain::new("x", "1")
            .with_chain_id(1)
            .with_verifying_contract(Address::ZERO);
        let schema = TypedSchema::single(domain.descriptor()).unwrap();
        assert_eq!(
            type_hash(&schema, Domain::TYPE_NAME).unwrap().to_string(),
            "0x8b73c3c69bb8fe3d512ecc4cf759cc79239f7b179b0ffacaa9a75d522b39400f"
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        let builder = DigestBuilder::new(Domain::default());
        let schema = message_schema();
        let v = values("hi", false, 1000);
        assert_eq!(
            builder.digest(&schema, &v).unwrap(),
            builder.digest(&schema, &v).unwrap()
        );
    }

    #[test]
    fn test_digest_changes_with_each_field() {
        let builder = DigestBuilder::new(Domain::default());
        let schema = message_schema();
        let base = builder.digest(&schema, &values("hi", false, 1000)).unwrap();

        for changed in [
            values("ho", false, 1000),
            values("hi", true, 1000),
            values("hi", false, 1001),
        ] {
            assert_ne!(builder.digest(&schema, &changed).unwrap(), base);
        }
    }

    #[test]
    fn test_digest_changes_with_domain_and_type() {
        let schema = message_schema();
        let v = values("hi", false, 1000);
        let base = DigestBuilder::new(Domain::default()).digest(&schema, &v).unwrap();

        let other_domain = DigestBuilder::new(Domain::default().with_chain_id(1));
        assert_ne!(other_domain.digest(&schema, &v).unwrap(), base);

        let renamed = TypedSchema::single(
            TypeDescriptor::parse(
                "OtherData",
                &[("message", "string"), ("urgent", "bool"), ("timestamp", "uint256")],
            )
            .unwrap(),
        )
        .unwrap();
        let builder = DigestBuilder::new(Domain::default());
        assert_ne!(builder.digest(&renamed, &v).unwrap(), base);

        let reordered = TypedSchema::single(
            TypeDescriptor::parse(
                "MessageData",
                &[("urgent", "bool"), ("message", "string"), ("timestamp", "uint256")],
            )
            .unwrap(),
        )
        .unwrap();
        assert_ne!(builder.digest(&reordered, &v).unwrap(), base);
    }

    #[test]
    fn test_number_and_string_timestamps_agree() {
        let builder = DigestBuilder::new(Domain::default());
        let schema = message_schema();
        let mut as_string = values("hi", false, 0);
        as_string.insert("timestamp".into(), json!("1000"));
        assert_eq!(
            builder.digest(&schema, &as_string).unwrap(),
            builder.digest(&schema, &values("hi", false, 1000)).unwrap()
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let builder = DigestBuilder::new(Domain::default());
        let schema = message_schema();
        let mut extra = values("hi", false, 1000);
        extra.insert("note".into(), json!("not signed"));
        assert_eq!(
            builder.digest(&schema, &extra).unwrap(),
            builder.digest(&schema, &values("hi", false, 1000)).unwrap()
        );
    }

    #[test]
    fn test_missing_field() {
        let builder = DigestBuilder::new(Domain::default());
        let mut v = values("hi", false, 1000);
        v.remove("urgent");
        assert_eq!(
            builder.digest(&message_schema(), &v),
            Err(PayloadError::MissingField("MessageData.urgent".into()))
        );
    }

    #[test]
    fn test_wrong_shapes() {
        let builder = DigestBuilder::new(Domain::default());
        let schema = message_schema();
        for (field, bad) in [
            ("message", json!(42)),
            ("urgent", json!("false")),
            ("timestamp", json!(-5)),
            ("timestamp", json!(null)),
        ] {
            let mut v = values("hi", false, 1000);
            v.insert(field.into(), bad);
            assert!(matches!(
                builder.digest(&schema, &v),
                Err(PayloadError::InvalidValue { .. })
            ));
        }
    }

    #[test]
    fn test_fixed_bytes_and_arrays() {
        let schema = TypedSchema::single(
            TypeDescriptor::parse("Batch", &[("tag", "bytes4"), ("ids", "uint8[2]"), ("blob", "bytes")])
                .unwrap(),
        )
        .unwrap();
        let builder = DigestBuilder::new(Domain::default());

        let ok = json!({ "tag": "0xdeadbeef", "ids": [1, 2], "blob": "0x" });
        assert!(builder.digest(&schema, ok.as_object().unwrap()).is_ok());

        let short_tag = json!({ "tag": "0xdead", "ids": [1, 2], "blob": "0x" });
        assert!(matches!(
            builder.digest(&schema, short_tag.as_object().unwrap()),
            Err(PayloadError::InvalidValue { .. })
        ));

        let wrong_len = json!({ "tag": "0xdeadbeef", "ids": [1], "blob": "0x" });
        assert_eq!(
            builder.digest(&schema, wrong_len.as_object().unwrap()),
            Err(PayloadError::ArrayLength {
                field: "Batch.ids".into(),
                expected: 2,
                got: 1
            })
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_single_field_change_changes_digest(
            message in ".{0,64}",
            urgent in proptest::prelude::any::<bool>(),
            timestamp in 0u64..u64::MAX,
        ) {
            let builder = DigestBuilder::new(Domain::default());
            let schema = message_schema();
            let base = builder.digest(&schema, &values(&message, urgent, timestamp)).unwrap();

            proptest::prop_assert_eq!(
                builder.digest(&schema, &values(&message, urgent, timestamp)).unwrap(),
                base
            );
            let edited = format!("{}!", message);
            proptest::prop_assert_ne!(
                builder.digest(&schema, &values(&edited, urgent, timestamp)).unwrap(),
                base
            );
            proptest::prop_assert_ne!(
                builder.digest(&schema, &values(&message, !urgent, timestamp)).unwrap(),
                base
            );
            proptest::prop_assert_ne!(
                builder.digest(&schema, &values(&message, urgent, timestamp + 1)).unwrap(),
                base
            );
        }
    }
}
