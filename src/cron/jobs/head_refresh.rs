//! Job to refresh every chain's stored head height.

use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;
use log::{debug, warn};

use crate::scraper::HeadTracker;

/// Polls and records the head of every chain concurrently.
///
/// A chain whose RPC fails keeps its previous head; the others are still updated.
pub async fn run(trackers: &[Arc<HeadTracker>]) -> Result<()> {
    let results = join_all(trackers.iter().map(|tracker| tracker.refresh())).await;

    for (tracker, result) in trackers.iter().zip(results) {
        match result {
            Ok(height) => debug!("Head of {} at {}", tracker.chain(), height),
            Err(e) => warn!("Failed to refresh head of {}: {:#}", tracker.chain(), e),
        }
    }

    Ok(())
}
