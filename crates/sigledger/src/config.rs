//! Ledger configuration: the signing domain and the action registry.
//!
//! Built once at startup and immutable afterwards. The JSON form mirrors
//! what wallets receive for `eth_signTypedData_v4`:
//!
//! ```json
//! {
//!   "domain": { "name": "Scaffold-eth EIP-712", "version": "1.0.0" },
//!   "actions": {
//!     "new-message": {
//!       "primaryType": "MessageData",
//!       "types": { "MessageData": [{ "name": "timestamp", "type": "uint256" }] },
//!       "timestampField": "timestamp"
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use sigledger_core::word::{parse_uint, word_to_u64};
use sigledger_core::{Domain, FieldType, FieldValues, PayloadError, SchemaError, TypedSchema};

/// Tag of the built-in message action.
pub const DEFAULT_ACTION: &str = "new-message";

/// Field carrying the replay timestamp unless an action names another.
pub const DEFAULT_TIMESTAMP_FIELD: &str = "timestamp";

/// One action: the schema its payloads are signed under and the field
/// that orders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub struct ActionSpec {
    schema: TypedSchema,
    timestamp_field: String,
}

impl ActionSpec {
    /// Pair a schema with its timestamp field.
    ///
    /// The field must be a `uintN` member of the primary type.
    pub fn new(schema: TypedSchema, timestamp_field: impl Into<String>) -> Result<Self, SchemaError> {
        let timestamp_field = timestamp_field.into();
        let primary = schema.primary();
        let reason = match primary.field(&timestamp_field) {
            None => Some("not declared"),
            Some(field) if !field.ty.is_uint() => Some("must be an unsigned integer"),
            Some(_) => None,
        };
        if let Some(reason) = reason {
            return Err(SchemaError::TimestampField {
                owner: primary.name.clone(),
                field: timestamp_field,
                reason: reason.to_string(),
            });
        }
        Ok(Self {
            schema,
            timestamp_field,
        })
    }

    /// The `new-message` action.
    pub fn message_data() -> Self {
        Self {
            schema: TypedSchema::message_data(),
            timestamp_field: DEFAULT_TIMESTAMP_FIELD.to_string(),
        }
    }

    pub fn schema(&self) -> &TypedSchema {
        &self.schema
    }

    pub fn timestamp_field(&self) -> &str {
        &self.timestamp_field
    }

    /// Read the replay timestamp out of `values`.
    pub fn timestamp(&self, values: &FieldValues) -> Result<u64, PayloadError> {
        let field = self.timestamp_field.as_str();
        let path = format!("{}.{}", self.schema.primary_name(), field);
        let value = values
            .get(field)
            .ok_or_else(|| PayloadError::MissingField(path.clone()))?;

        let bits = match self.schema.primary().field(field).map(|f| &f.ty) {
            Some(FieldType::Uint(bits)) => *bits,
            _ => 256,
        };
        let invalid = |reason: String| PayloadError::InvalidValue {
            field: path.clone(),
            ty: format!("uint{}", bits),
            reason,
        };

        let word = parse_uint(value, bits).map_err(&invalid)?;
        word_to_u64(&word).ok_or_else(|| invalid("timestamp does not fit in 64 bits".into()))
    }

    /// The subset of `values` this action declares, in declaration order.
    pub fn declared_values(&self, values: &FieldValues) -> FieldValues {
        self.schema
            .primary()
            .fields
            .iter()
            .filter_map(|f| values.get(&f.name).map(|v| (f.name.clone(), v.clone())))
            .collect()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAction {
    #[serde(flatten)]
    schema: TypedSchema,
    #[serde(default = "default_timestamp_field")]
    timestamp_field: String,
}

fn default_timestamp_field() -> String {
    DEFAULT_TIMESTAMP_FIELD.to_string()
}

impl TryFrom<RawAction> for ActionSpec {
    type Error = SchemaError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        ActionSpec::new(raw.schema, raw.timestamp_field)
    }
}

impl From<ActionSpec> for RawAction {
    fn from(spec: ActionSpec) -> Self {
        Self {
            schema: spec.schema,
            timestamp_field: spec.timestamp_field,
        }
    }
}

/// Fixed table from action tag to [`ActionSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionRegistry {
    actions: BTreeMap<String, ActionSpec>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action, replacing any previous one under `tag`.
    pub fn insert(&mut self, tag: impl Into<String>, spec: ActionSpec) -> Option<ActionSpec> {
        self.actions.insert(tag.into(), spec)
    }

    pub fn get(&self, tag: &str) -> Option<&ActionSpec> {
        self.actions.get(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Configuration for the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Domain mixed into every digest.
    #[serde(default)]
    pub domain: Domain,
    /// Accepted actions by tag.
    pub actions: ActionRegistry,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let mut actions = ActionRegistry::new();
        actions.insert(DEFAULT_ACTION, ActionSpec::message_data());
        Self {
            domain: Domain::default(),
            actions,
        }
    }
}

impl LedgerConfig {
    /// An empty registry under `domain`.
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            actions: ActionRegistry::new(),
        }
    }

    /// Add or replace an action.
    pub fn with_action(mut self, tag: impl Into<String>, spec: ActionSpec) -> Self {
        self.actions.insert(tag, spec);
        self
    }

    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("failed to parse ledger configuration")?;
        if config.actions.is_empty() {
            anyhow::bail!("ledger configuration declares no actions");
        }
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid configuration in {}", path.display()))
    }
}
