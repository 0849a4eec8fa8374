//! Type conversion and formatting utilities.
//!
//! Conversions from alloy integer types into arbitrary precision numbers, plus hex
//! formatting for storage.

use alloy::primitives::{hex, I256, U256};
use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};

/// Encode bytes as a lowercase hex string with 0x prefix.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Convert U256 to BigInt without precision loss.
pub fn u256_to_bigint(value: U256) -> BigInt {
    let bytes: [u8; 32] = value.to_le_bytes();
    BigInt::from_bytes_le(Sign::Plus, &bytes)
}

/// Convert I256 to BigInt without precision loss.
pub fn i256_to_bigint(value: I256) -> BigInt {
    let magnitude = u256_to_bigint(value.unsigned_abs());
    if value.is_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Scale an integer by `10^-scale`.
///
/// `shift_decimal(350000000000, 6)` is `350000.000000`.
pub fn shift_decimal(value: BigInt, scale: i64) -> BigDecimal {
    BigDecimal::new(value, scale)
}
