//! 256-bit big-endian words for integer field values.
//!
//! Integer fields arrive as JSON numbers or as decimal / hex strings (values
//! above 2^53 cannot round-trip through JavaScript numbers). These helpers
//! parse them into the 32-byte two's-complement words used by the encoder.

use alloy_primitives::{Sign, I256, U256};
use serde_json::Value;

/// A 256-bit big-endian word.
pub type Word = [u8; 32];

/// Parse an unsigned integer of at most `bits` bits.
pub fn parse_uint(value: &Value, bits: u16) -> Result<Word, String> {
    let parsed = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                U256::from(u)
            } else if n.as_i64().is_some() {
                return Err("negative value for unsigned type".into());
            } else {
                return Err("not an integer".into());
            }
        }
        Value::String(s) => parse_unsigned_text(s)?,
        _ => return Err("expected a number or numeric string".into()),
    };

    if parsed.bit_len() > usize::from(bits) {
        return Err(format!("value exceeds {} bits", bits));
    }
    Ok(parsed.to_be_bytes::<32>())
}

/// Parse a signed integer that fits `bits`-bit two's complement.
pub fn parse_int(value: &Value, bits: u16) -> Result<Word, String> {
    let (sign, magnitude) = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                let sign = if i < 0 { Sign::Negative } else { Sign::Positive };
                (sign, U256::from(i.unsigned_abs()))
            } else if let Some(u) = n.as_u64() {
                (Sign::Positive, U256::from(u))
            } else {
                return Err("not an integer".into());
            }
        }
        Value::String(s) => match s.strip_prefix('-') {
            Some(rest) => (Sign::Negative, parse_decimal(rest)?),
            None => (Sign::Positive, parse_unsigned_text(s)?),
        },
        _ => return Err("expected a number or numeric string".into()),
    };

    // -2^(bits-1) is the most negative value.
    let bound = U256::from(1u64) << (usize::from(bits) - 1);
    let fits = match sign {
        Sign::Positive => magnitude < bound,
        Sign::Negative => magnitude <= bound,
    };
    if !fits {
        return Err(format!("value out of range for int{}", bits));
    }

    let signed = I256::checked_from_sign_and_abs(sign, magnitude)
        .ok_or_else(|| format!("value out of range for int{}", bits))?;
    Ok(signed.into_raw().to_be_bytes::<32>())
}

/// The word as `u64`, if its value fits.
pub fn word_to_u64(word: &Word) -> Option<u64> {
    u64::try_from(U256::from_be_bytes(*word)).ok()
}

pub fn word_from_u64(value: u64) -> Word {
    U256::from(value).to_be_bytes::<32>()
}

fn parse_unsigned_text(s: &str) -> Result<U256, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => parse_hex(digits),
        None => parse_decimal(s),
    }
}

fn parse_decimal(digits: &str) -> Result<U256, String> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid decimal integer: {:?}", digits));
    }
    U256::from_str_radix(digits, 10).map_err(|_| "value exceeds 256 bits".to_string())
}

fn parse_hex(digits: &str) -> Result<U256, String> {
    if digits.is_empty() || digits.len() > 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("invalid hex integer: 0x{}", digits));
    }
    U256::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_uint_from_number_and_strings() {
        let expected = word_from_u64(1000);
        assert_eq!(parse_uint(&json!(1000), 256).unwrap(), expected);
        assert_eq!(parse_uint(&json!("1000"), 256).unwrap(), expected);
        assert_eq!(parse_uint(&json!("0x3e8"), 256).unwrap(), expected);
    }

    #[test]
    fn test_uint_beyond_u64() {
        // 2^64
        let word = parse_uint(&json!("18446744073709551616"), 256).unwrap();
        assert_eq!(word[23], 1);
        assert!(word[24..].iter().all(|b| *b == 0));
        assert_eq!(word_to_u64(&word), None);
    }

    #[test]
    fn test_uint_width_enforced() {
        assert!(parse_uint(&json!(255), 8).is_ok());
        assert!(parse_uint(&json!(256), 8).is_err());
        assert!(parse_uint(&json!(-1), 256).is_err());
        assert!(parse_uint(&json!(1.5), 256).is_err());
        assert!(parse_uint(&json!(true), 256).is_err());
        assert!(parse_uint(&json!("12a"), 256).is_err());
    }

    #[test]
    fn test_uint256_overflow() {
        let max = format!("0x{}", "f".repeat(64));
        assert!(parse_uint(&json!(max), 256).is_ok());
        // 2^256
        let over =
            "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(parse_uint(&json!(over), 256).is_err());
    }

    #[test]
    fn test_int_two_complement() {
        assert_eq!(parse_int(&json!(-1), 256).unwrap(), [0xff; 32]);
        assert_eq!(parse_int(&json!("-1"), 256).unwrap(), [0xff; 32]);
        assert_eq!(parse_int(&json!(5), 8).unwrap(), word_from_u64(5));
    }

    #[test]
    fn test_int_range() {
        assert!(parse_int(&json!(127), 8).is_ok());
        assert!(parse_int(&json!(128), 8).is_err());
        assert!(parse_int(&json!(-128), 8).is_ok());
        assert!(parse_int(&json!(-129), 8).is_err());
        assert!(parse_int(&json!("-0"), 8).is_ok());
    }

    #[test]
    fn test_int256_extremes() {
        // -2^255
        let min = "-57896044618658097711785492504343953926634992332820282019728792003956564819968";
        let mut expected = [0u8; 32];
        expected[0] = 0x80;
        assert_eq!(parse_int(&json!(min), 256).unwrap(), expected);
        // 2^255 does not fit.
        assert!(parse_int(&json!(&min[1..]), 256).is_err());
    }

    #[test]
    fn test_word_to_u64() {
        assert_eq!(word_to_u64(&word_from_u64(u64::MAX)), Some(u64::MAX));
    }
}
