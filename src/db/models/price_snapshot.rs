use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

/// USD prices at a point in time (PostgreSQL `prices`).
///
/// All three prices are in cents.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSnapshot {
    pub created_at: DateTime<Utc>,
    /// Secondary token, derived from the pool and the primary oracle.
    pub token_usd_cents: BigDecimal,
    /// Primary chain native asset, from the primary oracle.
    pub native_usd_cents: BigDecimal,
    /// Reference asset, from the reference oracle.
    pub reference_usd_cents: BigDecimal,
}

impl PriceSnapshot {
    pub fn new(
        token_usd_cents: BigDecimal,
        native_usd_cents: BigDecimal,
        reference_usd_cents: BigDecimal,
    ) -> Self {
        Self {
            created_at: Utc::now(),
            token_usd_cents,
            native_usd_cents,
            reference_usd_cents,
        }
    }
}
