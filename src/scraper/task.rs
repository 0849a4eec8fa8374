use alloy::primitives::Address;
use anyhow::Result;

use crate::{
    config::{parse_address, ChainSettings},
    db::models::CheckpointKey,
};

/// What a task scrapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Value-carrying transactions to whitelisted recipients.
    Native,
    /// `Transfer` events of the ERC20 at this address.
    Token(Address),
}

/// One (chain, asset) stream to keep scraped.
///
/// `scan_range` and `overlap` seed the task's tunable checkpoint keys; values already in
/// the store take precedence.
#[derive(Debug, Clone)]
pub struct ChainAssetTask {
    pub chain: String,
    pub chain_id: u64,
    pub symbol: String,
    pub kind: AssetKind,
    pub decimals: u8,
    pub enabled: bool,
    pub scan_range: u64,
    pub overlap: u64,
    pub start_block: u64,
}

impl ChainAssetTask {
    /// Every asset task configured for a chain: the native asset first, then tokens.
    pub fn from_chain(settings: &ChainSettings) -> Result<Vec<Self>> {
        let mut tasks = Vec::with_capacity(settings.tokens.len() + 1);

        if let Some(native) = &settings.native {
            tasks.push(Self {
                chain: settings.name.clone(),
                chain_id: settings.chain_id,
                symbol: native.symbol.to_uppercase(),
                kind: AssetKind::Native,
                decimals: native.decimals,
                enabled: native.enabled,
                scan_range: native.scan_range,
                overlap: native.overlap,
                start_block: settings.start_block,
            });
        }

        for token in &settings.tokens {
            tasks.push(Self {
                chain: settings.name.clone(),
                chain_id: settings.chain_id,
                symbol: token.symbol.to_uppercase(),
                kind: AssetKind::Token(parse_address(&token.address)?),
                decimals: token.decimals,
                enabled: token.enabled,
                scan_range: token.scan_range,
                overlap: token.overlap,
                start_block: settings.start_block,
            });
        }

        Ok(tasks)
    }

    /// Token contract, or `None` for the native asset.
    pub fn contract(&self) -> Option<Address> {
        match self.kind {
            AssetKind::Native => None,
            AssetKind::Token(address) => Some(address),
        }
    }

    /// `chain/SYMBOL`, for logs.
    pub fn label(&self) -> String {
        format!("{}/{}", self.chain, self.symbol)
    }

    pub fn last_block_key(&self) -> String {
        CheckpointKey::last_block(&self.chain, &self.symbol)
    }

    pub fn scan_range_key(&self) -> String {
        CheckpointKey::scrape_range(&self.chain, &self.symbol)
    }

    pub fn overlap_key(&self) -> String {
        CheckpointKey::scrape_lookback(&self.chain, &self.symbol)
    }

    pub fn head_key(&self) -> String {
        CheckpointKey::block_height(&self.chain)
    }
}
