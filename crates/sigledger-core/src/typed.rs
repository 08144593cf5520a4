//! Type descriptors and signing domains for structured data.
//!
//! A [`TypedSchema`] is the EIP-712 `types` table plus its primary type.
//! It is validated once on construction: every referenced struct exists,
//! every type name is canonical, and no type declares a field twice.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::crypto::Keccak256Hash;
use crate::error::SchemaError;
use crate::types::Address;

/// The declared type of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Bool,
    Address,
    String,
    Bytes,
    /// `bytes1` through `bytes32`.
    FixedBytes(u8),
    /// `uint8` through `uint256`, width in bits.
    Uint(u16),
    /// `int8` through `int256`, width in bits.
    Int(u16),
    /// `T[]` when the length is `None`, `T[n]` otherwise.
    Array(Box<FieldType>, Option<usize>),
    /// Reference to another struct type in the same schema.
    Struct(String),
}

impl FieldType {
    /// The struct type this field ultimately refers to, looking through arrays.
    pub fn struct_name(&self) -> Option<&str> {
        match self {
            FieldType::Struct(name) => Some(name),
            FieldType::Array(inner, _) => inner.struct_name(),
            _ => None,
        }
    }

    pub fn is_uint(&self) -> bool {
        matches!(self, FieldType::Uint(_))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Bool => f.write_str("bool"),
            FieldType::Address => f.write_str("address"),
            FieldType::String => f.write_str("string"),
            FieldType::Bytes => f.write_str("bytes"),
            FieldType::FixedBytes(n) => write!(f, "bytes{}", n),
            FieldType::Uint(bits) => write!(f, "uint{}", bits),
            FieldType::Int(bits) => write!(f, "int{}", bits),
            FieldType::Array(inner, None) => write!(f, "{}[]", inner),
            FieldType::Array(inner, Some(len)) => write!(f, "{}[{}]", inner, len),
            FieldType::Struct(name) => f.write_str(name),
        }
    }
}

impl FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchemaError::InvalidType(s.to_string());

        if let Some(head) = s.strip_suffix(']') {
            let open = head.rfind('[').ok_or_else(invalid)?;
            let len = &head[open + 1..];
            let len = if len.is_empty() {
                None
            } else {
                Some(len.parse::<usize>().map_err(|_| invalid())?)
            };
            let inner: FieldType = head[..open].parse()?;
            return Ok(FieldType::Array(Box::new(inner), len));
        }

        match s {
            "bool" => return Ok(FieldType::Bool),
            "address" => return Ok(FieldType::Address),
            "string" => return Ok(FieldType::String),
            "bytes" => return Ok(FieldType::Bytes),
            _ => {}
        }

        for (prefix, kind) in [("bytes", 0u8), ("uint", 1), ("int", 2)] {
            let Some(width) = s.strip_prefix(prefix) else {
                continue;
            };
            if !width.bytes().all(|b| b.is_ascii_digit()) {
                continue;
            }
            if width.starts_with('0') {
                return Err(invalid());
            }
            let width: u16 = width.parse().map_err(|_| invalid())?;
            return match kind {
                0 if (1..=32).contains(&width) => Ok(FieldType::FixedBytes(width as u8)),
                1 if valid_int_width(width) => Ok(FieldType::Uint(width)),
                2 if valid_int_width(width) => Ok(FieldType::Int(width)),
                _ => Err(invalid()),
            };
        }

        if is_identifier(s) {
            Ok(FieldType::Struct(s.to_string()))
        } else {
            Err(invalid())
        }
    }
}

fn valid_int_width(bits: u16) -> bool {
    bits % 8 == 0 && (8..=256).contains(&bits)
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// A named field and its declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// An ordered list of fields naming a struct type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    /// Build from `(name, type)` string pairs.
    pub fn parse(name: &str, fields: &[(&str, &str)]) -> Result<Self, SchemaError> {
        let fields = fields
            .iter()
            .map(|(field, ty)| Ok(FieldSpec::new(*field, ty.parse()?)))
            .collect::<Result<Vec<_>, SchemaError>>()?;
        Ok(Self::new(name, fields))
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// `Name(type1 name1,type2 name2)`
    pub fn encode(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.ty, f.name))
            .collect();
        format!("{}({})", self.name, fields.join(","))
    }
}

/// A primary struct type together with every struct type it references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSchema", into = "RawSchema")]
pub struct TypedSchema {
    primary: String,
    types: BTreeMap<String, TypeDescriptor>,
}

impl TypedSchema {
    /// Validate and build a schema.
    pub fn new(primary: &str, descriptors: Vec<TypeDescriptor>) -> Result<Self, SchemaError> {
        let mut types = BTreeMap::new();
        for descriptor in descriptors {
            if !is_identifier(&descriptor.name) {
                return Err(SchemaError::InvalidTypeName(descriptor.name));
            }
            let mut seen = BTreeSet::new();
            for field in &descriptor.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(SchemaError::DuplicateField {
                        owner: descriptor.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
            types.insert(descriptor.name.clone(), descriptor);
        }

        for descriptor in types.values() {
            for field in &descriptor.fields {
                if let Some(name) = field.ty.struct_name() {
                    if !types.contains_key(name) {
                        return Err(SchemaError::UndefinedType {
                            owner: descriptor.name.clone(),
                            missing: name.to_string(),
                        });
                    }
                }
            }
        }

        if !types.contains_key(primary) {
            return Err(SchemaError::MissingPrimaryType(primary.to_string()));
        }

        Ok(Self {
            primary: primary.to_string(),
            types,
        })
    }

    /// A schema with a single flat struct type.
    pub fn single(descriptor: TypeDescriptor) -> Result<Self, SchemaError> {
        let primary = descriptor.name.clone();
        Self::new(&primary, vec![descriptor])
    }

    /// `MessageData(string message,bool urgent,uint256 timestamp)`, the
    /// schema of the built-in `new-message` action.
    pub fn message_data() -> Self {
        let descriptor = TypeDescriptor::new(
            "MessageData",
            vec![
                FieldSpec::new("message", FieldType::String),
                FieldSpec::new("urgent", FieldType::Bool),
                FieldSpec::new("timestamp", FieldType::Uint(256)),
            ],
        );
        let mut types = BTreeMap::new();
        types.insert(descriptor.name.clone(), descriptor);
        Self {
            primary: "MessageData".to_string(),
            types,
        }
    }

    pub fn primary_name(&self) -> &str {
        &self.primary
    }

    pub fn primary(&self) -> &TypeDescriptor {
        // Presence checked in `new`.
        &self.types[&self.primary]
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.get(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.values()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchema {
    primary_type: String,
    types: BTreeMap<String, Vec<RawField>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

impl TryFrom<RawSchema> for TypedSchema {
    type Error = SchemaError;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        let descriptors = raw
            .types
            .into_iter()
            .map(|(name, fields)| {
                let fields = fields
                    .into_iter()
                    .map(|f| Ok(FieldSpec::new(f.name, f.ty.parse()?)))
                    .collect::<Result<Vec<_>, SchemaError>>()?;
                Ok(TypeDescriptor::new(name, fields))
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;
        TypedSchema::new(&raw.primary_type, descriptors)
    }
}

impl From<TypedSchema> for RawSchema {
    fn from(schema: TypedSchema) -> Self {
        let types = schema
            .types
            .into_iter()
            .map(|(name, descriptor)| {
                let fields = descriptor
                    .fields
                    .into_iter()
                    .map(|f| RawField {
                        name: f.name,
                        ty: f.ty.to_string(),
                    })
                    .collect();
                (name, fields)
            })
            .collect();
        RawSchema {
            primary_type: schema.primary,
            types,
        }
    }
}

/// The signing domain mixed into every digest.
///
/// Only the members that are set take part in the `EIP712Domain` type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifying_contract: Option<Address>,
    /// Arbitrary 32-byte disambiguator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<Keccak256Hash>,
}

impl Domain {
    pub const TYPE_NAME: &'static str = "EIP712Domain";

    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            chain_id: None,
            verifying_contract: None,
            salt: None,
        }
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn with_verifying_contract(mut self, contract: Address) -> Self {
        self.verifying_contract = Some(contract);
        self
    }

    pub fn with_salt(mut self, salt: Keccak256Hash) -> Self {
        self.salt = Some(salt);
        self
    }

    /// The `EIP712Domain` type for the members that are set.
    pub fn descriptor(&self) -> TypeDescriptor {
        let mut fields = Vec::with_capacity(5);
        if self.name.is_some() {
            fields.push(FieldSpec::new("name", FieldType::String));
        }
        if self.version.is_some() {
            fields.push(FieldSpec::new("version", FieldType::String));
        }
        if self.chain_id.is_some() {
            fields.push(FieldSpec::new("chainId", FieldType::Uint(256)));
        }
        if self.verifying_contract.is_some() {
            fields.push(FieldSpec::new("verifyingContract", FieldType::Address));
        }
        if self.salt.is_some() {
            fields.push(FieldSpec::new("salt", FieldType::FixedBytes(32)));
        }
        TypeDescriptor::new(Self::TYPE_NAME, fields)
    }
}

impl Default for Domain {
    fn default() -> Self {
        Self::new("Scaffold-eth EIP-712", "1.0.0")
    }
}
