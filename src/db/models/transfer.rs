use alloy::primitives::{Address, B256, U256};

/// A native or ERC20 value transfer (PostgreSQL `transfers`).
///
/// Identity is `(chain_id, tx_hash, log_index)`. For native transfers `log_index` is the
/// transaction's position in its block and `contract` is the zero address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub block_number: u64,
    pub log_index: u64,
    pub chain_id: u64,
    pub contract: Address,
    pub symbol: String,
    pub decimals: u8,
    pub tx_hash: B256,
    pub from_address: Address,
    pub to_address: Address,
    pub amount: U256,
    /// Block timestamp (unix seconds).
    pub timestamp: u64,
}

impl TransferRecord {
    /// Create a transfer from a native value-carrying transaction.
    #[allow(clippy::too_many_arguments)]
    pub fn from_native(
        chain_id: u64,
        symbol: &str,
        decimals: u8,
        block_number: u64,
        position: u64,
        tx_hash: B256,
        from_address: Address,
        to_address: Option<Address>,
        amount: U256,
        timestamp: u64,
    ) -> Self {
        Self {
            block_number,
            log_index: position,
            chain_id,
            contract: Address::ZERO,
            symbol: symbol.to_uppercase(),
            decimals,
            tx_hash,
            from_address,
            to_address: to_address.unwrap_or(Address::ZERO),
            amount,
            timestamp,
        }
    }

    /// Create a transfer from a decoded ERC20 `Transfer` log.
    #[allow(clippy::too_many_arguments)]
    pub fn from_event(
        chain_id: u64,
        contract: Address,
        symbol: &str,
        decimals: u8,
        event: &crate::abis::Transfer,
        block_number: u64,
        log_index: u64,
        tx_hash: B256,
        timestamp: u64,
    ) -> Self {
        Self {
            block_number,
            log_index,
            chain_id,
            contract,
            symbol: symbol.to_uppercase(),
            decimals,
            tx_hash,
            from_address: event.from,
            to_address: event.to,
            amount: event.value,
            timestamp,
        }
    }

    /// Blocks built on top of this transfer's block, given the current head.
    pub fn confirmations(&self, head: u64) -> u64 {
        head.saturating_sub(self.block_number)
    }
}
