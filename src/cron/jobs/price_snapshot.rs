//! Job to record current USD prices.

use anyhow::Result;

use crate::prices::PriceAggregator;

pub async fn run(aggregator: &PriceAggregator) -> Result<()> {
    aggregator.snapshot().await?;
    Ok(())
}
