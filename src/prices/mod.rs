mod aggregator;

pub use aggregator::PriceAggregator;
