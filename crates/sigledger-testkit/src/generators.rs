//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::Value;

use sigledger::core::{Address, Domain, FieldValues, Keypair};

use crate::fixtures::message_values;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_filter_map("valid secp256k1 secret", |bytes| {
        Keypair::from_secret_bytes(&bytes).ok()
    })
}

/// Generate a random address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::from)
}

/// Generate a timestamp anywhere in `u64`.
pub fn timestamp() -> impl Strategy<Value = u64> {
    any::<u64>()
}

/// Generate 1..=`max_len` strictly increasing timestamps.
pub fn increasing_timestamps(max_len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::btree_set(any::<u64>(), 1..=max_len.max(1))
        .prop_map(|set| set.into_iter().collect())
}

/// Generate a message body.
pub fn message_text() -> impl Strategy<Value = String> {
    ".{0,64}".prop_map(String::from)
}

/// Generate `new-message` values.
pub fn message(timestamp: impl Strategy<Value = u64>) -> impl Strategy<Value = FieldValues> {
    (message_text(), any::<bool>(), timestamp)
        .prop_map(|(text, urgent, ts)| message_values(&text, urgent, ts))
}

/// Generate a signing domain with a random subset of optional members.
pub fn domain() -> impl Strategy<Value = Domain> {
    (
        "[A-Za-z][A-Za-z0-9 -]{0,23}",
        "[0-9]{1,2}(\\.[0-9]{1,2}){0,2}",
        prop::option::of(any::<u64>()),
        prop::option::of(address()),
    )
        .prop_map(|(name, version, chain_id, contract)| {
            let mut domain = Domain::new(name, version);
            if let Some(chain_id) = chain_id {
                domain = domain.with_chain_id(chain_id);
            }
            if let Some(contract) = contract {
                domain = domain.with_verifying_contract(contract);
            }
            domain
        })
}

/// Replace one field of a `new-message` payload with a different value.
pub fn perturb(values: &FieldValues, field: usize) -> FieldValues {
    let mut out = values.clone();
    match field % 3 {
        0 => {
            let text = out.get("message").and_then(Value::as_str).unwrap_or("");
            out.insert("message".into(), Value::String(format!("{}!", text)));
        }
        1 => {
            let urgent = out.get("urgent").and_then(Value::as_bool).unwrap_or(false);
            out.insert("urgent".into(), Value::Bool(!urgent));
        }
        _ => {
            let ts = out.get("timestamp").and_then(Value::as_u64).unwrap_or(0);
            out.insert("timestamp".into(), Value::from(ts.wrapping_add(1)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn increasing_timestamps_are_strict(ts in increasing_timestamps(16)) {
            prop_assert!(!ts.is_empty());
            prop_assert!(ts.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn perturb_changes_the_payload(values in message(timestamp()), field in 0usize..3) {
            prop_assert_ne!(perturb(&values, field), values);
        }
    }
}
