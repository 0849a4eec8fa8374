use std::sync::Arc;

use alloy::{
    primitives::{Address, LogData},
    sol_types::SolEvent,
};
use anyhow::{bail, Result};
use log::{debug, info, warn};
use rustc_hash::FxHashSet;
use tokio::sync::Mutex;

use crate::{
    abis::Transfer,
    chain::{ChainLog, ChainReader},
    db::{
        models::TransferRecord,
        store::{CheckpointStore, TransferLedger, Whitelist},
    },
    scraper::{AssetKind, ChainAssetTask, ScanWindow},
};

/// Result of scanning one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub window: ScanWindow,
    /// Records newly written to the ledger; rows already present are not counted.
    pub emitted: usize,
}

/// Result of one checkpointed scraper invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    pub window: ScanWindow,
    pub emitted: usize,
    /// Checkpoint after the invocation.
    pub last_scraped: u64,
    /// Head height the window was capped at.
    pub head: u64,
}

impl TickOutcome {
    pub fn caught_up(&self) -> bool {
        self.last_scraped >= self.head
    }
}

/// Scrapes one [`ChainAssetTask`] window by window.
///
/// Each task has exactly one scraper, and the scraper's tick guard makes it the only
/// writer of the task's checkpoint: header-triggered, scheduled and catch-up ticks
/// never run concurrently.
pub struct WindowScraper {
    task: ChainAssetTask,
    reader: Arc<dyn ChainReader>,
    checkpoints: Arc<dyn CheckpointStore>,
    ledger: Arc<dyn TransferLedger>,
    whitelist: Arc<dyn Whitelist>,
    configured_recipients: Vec<Address>,
    tick_guard: Mutex<()>,
}

impl WindowScraper {
    pub fn new(
        task: ChainAssetTask,
        reader: Arc<dyn ChainReader>,
        checkpoints: Arc<dyn CheckpointStore>,
        ledger: Arc<dyn TransferLedger>,
        whitelist: Arc<dyn Whitelist>,
        configured_recipients: Vec<Address>,
    ) -> Self {
        Self {
            task,
            reader,
            checkpoints,
            ledger,
            whitelist,
            configured_recipients,
            tick_guard: Mutex::new(()),
        }
    }

    pub fn task(&self) -> &ChainAssetTask {
        &self.task
    }

    /// Reads the task's checkpoints, scans the next window and advances the
    /// last-scraped block. Waits for a tick already in progress.
    pub async fn tick(&self) -> Result<TickOutcome> {
        let _guard = self.tick_guard.lock().await;
        self.tick_locked().await
    }

    /// Like [`tick`](Self::tick), but returns `None` instead of waiting when a tick is
    /// already in progress.
    pub async fn try_tick(&self) -> Option<Result<TickOutcome>> {
        let _guard = self.tick_guard.try_lock().ok()?;
        Some(self.tick_locked().await)
    }

    async fn tick_locked(&self) -> Result<TickOutcome> {
        let task = &self.task;

        let range = self
            .checkpoints
            .get_u64(&task.scan_range_key(), task.scan_range)
            .await?;
        if range == 0 {
            bail!("Scan range for {} is zero", task.label());
        }
        let overlap = self
            .checkpoints
            .get_u64(&task.overlap_key(), task.overlap)
            .await?;
        let last_scraped = self
            .checkpoints
            .get_u64(&task.last_block_key(), task.start_block)
            .await?;
        let head = self.checkpoints.get_u64(&task.head_key(), 0).await?;

        let outcome = self.scan_window(last_scraped, head, range, overlap).await?;

        // The window can end below the checkpoint when the stored head lags; the
        // checkpoint itself never moves back.
        let next = outcome.window.to_block.max(last_scraped);
        if next != last_scraped {
            self.checkpoints
                .set_u64(&task.last_block_key(), next)
                .await?;
        }

        debug!(
            "Scraped {} blocks {}..{}: {} new transfers, checkpoint {}",
            task.label(),
            outcome.window.from_block,
            outcome.window.to_block,
            outcome.emitted,
            next
        );

        Ok(TickOutcome {
            window: outcome.window,
            emitted: outcome.emitted,
            last_scraped: next,
            head,
        })
    }

    /// Scans the window implied by the arguments and writes every transfer found.
    /// Does not touch checkpoints.
    pub async fn scan_window(
        &self,
        last_scraped: u64,
        head: u64,
        range: u64,
        overlap: u64,
    ) -> Result<ScrapeOutcome> {
        let window = ScanWindow::compute(last_scraped, overlap, range, head);

        let emitted = match self.task.kind {
            AssetKind::Native => self.scan_native(window).await?,
            AssetKind::Token(contract) => self.scan_token(contract, window).await?,
        };

        Ok(ScrapeOutcome { window, emitted })
    }

    /// Configured recipients merged with the stored whitelist for this chain.
    async fn recipients(&self) -> Result<FxHashSet<Address>> {
        let mut recipients: FxHashSet<Address> =
            self.configured_recipients.iter().copied().collect();
        recipients.extend(
            self.whitelist
                .whitelisted_addresses(self.task.chain_id)
                .await?,
        );
        Ok(recipients)
    }

    async fn scan_native(&self, window: ScanWindow) -> Result<usize> {
        let recipients = self.recipients().await?;
        if recipients.is_empty() {
            debug!(
                "No whitelisted recipients for {}, skipping blocks {}..{}",
                self.task.label(),
                window.from_block,
                window.to_block
            );
            return Ok(0);
        }

        let mut emitted = 0;
        for number in window.blocks() {
            let block = self.reader.block_with_transactions(number).await?;

            for tx in &block.transactions {
                let Some(to) = tx.to else {
                    continue;
                };
                if !recipients.contains(&to) {
                    continue;
                }
                let Some(sender) = tx.sender else {
                    warn!(
                        "Skipping {} transaction {} in block {}: sender not recoverable",
                        self.task.label(),
                        tx.hash,
                        block.number
                    );
                    continue;
                };

                let record = TransferRecord::from_native(
                    self.task.chain_id,
                    &self.task.symbol,
                    self.task.decimals,
                    block.number,
                    tx.position,
                    tx.hash,
                    sender,
                    tx.to,
                    tx.value,
                    block.timestamp,
                );

                if self.ledger.insert_transfer(&record).await? {
                    emitted += 1;
                }
            }
        }

        Ok(emitted)
    }

    async fn scan_token(&self, contract: Address, window: ScanWindow) -> Result<usize> {
        if window.is_inverted() {
            return Ok(0);
        }

        let logs = self
            .reader
            .filter_logs(
                contract,
                Transfer::SIGNATURE_HASH,
                window.from_block,
                window.to_block,
            )
            .await?;

        let mut emitted = 0;
        for log in &logs {
            let Some(record) = self.decode_transfer(contract, log).await? else {
                continue;
            };
            if self.ledger.insert_transfer(&record).await? {
                emitted += 1;
            }
        }

        Ok(emitted)
    }

    /// `Ok(None)` for logs that cannot be turned into a record.
    async fn decode_transfer(
        &self,
        contract: Address,
        log: &ChainLog,
    ) -> Result<Option<TransferRecord>> {
        let (Some(block_number), Some(log_index), Some(tx_hash)) =
            (log.block_number, log.log_index, log.tx_hash)
        else {
            warn!(
                "Skipping {} log without block position: {:?}",
                self.task.label(),
                log
            );
            return Ok(None);
        };

        let log_data = LogData::new_unchecked(log.topics.clone(), log.data.clone());
        let event = match Transfer::decode_log_data(&log_data) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    "Skipping undecodable {} transfer {}:{}: {}",
                    self.task.label(),
                    tx_hash,
                    log_index,
                    e
                );
                return Ok(None);
            },
        };

        let timestamp = match log.block_timestamp {
            Some(timestamp) => timestamp,
            None => self.reader.block_timestamp(block_number).await?,
        };

        Ok(Some(TransferRecord::from_event(
            self.task.chain_id,
            contract,
            &self.task.symbol,
            self.task.decimals,
            &event,
            block_number,
            log_index,
            tx_hash,
            timestamp,
        )))
    }

    /// Compares a token task's configured decimals with the contract's. Mismatches are
    /// logged; amounts are stored raw either way.
    pub async fn verify_decimals(&self) -> Result<()> {
        let Some(contract) = self.task.contract() else {
            return Ok(());
        };

        let onchain = self.reader.token_decimals(contract).await?;
        if onchain != self.task.decimals {
            warn!(
                "{} is configured with {} decimals but {} reports {}",
                self.task.label(),
                self.task.decimals,
                contract,
                onchain
            );
        } else {
            info!("{} decimals verified ({})", self.task.label(), onchain);
        }

        Ok(())
    }
}
