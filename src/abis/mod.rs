pub mod erc20;
pub mod oracle;
pub mod pool;
pub mod transfer;

pub use erc20::IERC20;
pub use oracle::IAggregatorV3;
pub use pool::IUniswapV3Pool;
pub use transfer::Transfer;
