mod checkpoint;
mod price_snapshot;
mod transfer;

pub use checkpoint::CheckpointKey;
pub use price_snapshot::PriceSnapshot;
pub use transfer::TransferRecord;
