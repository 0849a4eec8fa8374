//! Price derivation from oracle answers and Uniswap V3 pool state.
//!
//! All prices here are in cents. Oracle answers carry 8 decimals, so shifting them by
//! 10^-6 yields cents directly.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::Zero;
use once_cell::sync::Lazy;

use alloy::primitives::{I256, U256};

use super::conversion::{i256_to_bigint, shift_decimal, u256_to_bigint};

/// Decimal shift applied to oracle answers.
pub const ORACLE_ANSWER_SCALE: i64 = 6;

/// Significant digits kept on derived prices.
pub const DERIVED_PRICE_PRECISION: u64 = 18;

/// Constant: 2^192, the square of the Q64.96 scaling factor.
static Q192: Lazy<BigDecimal> = Lazy::new(|| BigDecimal::from(BigInt::from(1) << 192));

/// Convert a `latestRoundData` answer to a price.
pub fn oracle_answer_to_price(answer: I256) -> BigDecimal {
    shift_decimal(i256_to_bigint(answer), ORACLE_ANSWER_SCALE)
}

/// Price of the pool's token1 in terms of token0 as `(sqrtPriceX96)^2 / 2^192`.
pub fn sqrt_price_x96_to_price(sqrt_price_x96: U256) -> BigDecimal {
    let sqrt_price = BigDecimal::from(u256_to_bigint(sqrt_price_x96));
    (&sqrt_price * &sqrt_price) / &*Q192
}

/// Price of the secondary token given the primary asset's price and the pool's implied
/// price.
///
/// The result is zero only when the primary price is zero or the pool is empty (zero
/// implied price, which is not divided by). Any other quotient keeps its leading
/// [`DERIVED_PRICE_PRECISION`] significant digits, so a tiny price stays non-zero.
pub fn derive_token_price(primary_price: &BigDecimal, pool_price: &BigDecimal) -> BigDecimal {
    if pool_price.is_zero() || primary_price.is_zero() {
        return BigDecimal::zero();
    }
    (primary_price / pool_price).with_prec(DERIVED_PRICE_PRECISION)
}

/// Replace an exactly-zero derived price with `fallback`. Any non-zero price is kept.
pub fn apply_zero_price_fallback(price: BigDecimal, fallback: &BigDecimal) -> BigDecimal {
    if price.is_zero() {
        fallback.clone()
    } else {
        price
    }
}
