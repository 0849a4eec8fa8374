//! Utility functions for the price feed.
//!
//! - [`conversion`] - Type conversions (U256/I256 to BigInt, hex encoding)
//! - [`price`] - Oracle and sqrtPriceX96 price derivation

mod conversion;
mod price;

pub use conversion::{hex_encode, i256_to_bigint, shift_decimal, u256_to_bigint};

pub use price::{
    apply_zero_price_fallback, derive_token_price, oracle_answer_to_price,
    sqrt_price_x96_to_price, DERIVED_PRICE_PRECISION, ORACLE_ANSWER_SCALE,
};
