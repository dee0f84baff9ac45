//! Numeric quantity codec for JSON-RPC values.
//!
//! Nodes encode integers as `0x`-prefixed hex strings. Heights, gas limits
//! and hash rates have no upper bound on some chains, so everything decodes
//! into an arbitrary-precision [`BigUint`].

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::error::DecodeError;

/// Decodes a prefixed numeric literal into a [`BigUint`].
///
/// The base is taken from the prefix (`0x` hex, `0o` octal, `0b` binary);
/// an unprefixed literal is decimal. `field` only labels the error.
pub fn decode_quantity(field: &str, literal: &str) -> Result<BigUint, DecodeError> {
    let trimmed = literal.trim();
    let (digits, radix) = split_radix(trimmed);

    if digits.is_empty() {
        return Err(DecodeError::new(field, literal, "no digits"));
    }
    if !digits.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DecodeError::new(field, literal, "unexpected character"));
    }

    BigUint::parse_bytes(digits.as_bytes(), radix)
        .ok_or_else(|| DecodeError::new(field, literal, format!("invalid digit for base {radix}")))
}

fn split_radix(literal: &str) -> (&str, u32) {
    for (prefixes, radix) in [(["0x", "0X"], 16), (["0o", "0O"], 8), (["0b", "0B"], 2)] {
        for prefix in prefixes {
            if let Some(rest) = literal.strip_prefix(prefix) {
                return (rest, radix);
            }
        }
    }
    (literal, 10)
}

/// Encodes a quantity as a `0x`-prefixed lowercase hex string.
pub fn encode_quantity(value: &BigUint) -> String {
    format!("0x{value:x}")
}

/// Narrows a decoded quantity to `u64`, failing if it does not fit.
pub fn quantity_to_u64(field: &str, value: &BigUint) -> Result<u64, DecodeError> {
    value
        .to_u64()
        .ok_or_else(|| DecodeError::new(field, encode_quantity(value), "value exceeds 64 bits"))
}

/// Lossy conversion for gauge values. Saturates to infinity.
pub fn quantity_to_f64(value: &BigUint) -> f64 {
    value.to_f64().unwrap_or(f64::INFINITY)
}
