//! Feeds synced blocks through the parser into the tracker and reconciler.

use crate::reconcile::Reconciler;
use crate::sync::{SyncEvent, SyncObserver};
use crate::tracker::BalanceTracker;
use anyhow::anyhow;
use async_trait::async_trait;
use blockcheck_domain::entities::Block;
use blockcheck_domain::value_objects::BlockIdentifier;
use blockcheck_parser::prelude::Parser;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Sync observer that keeps computed balances current and queues every
/// balance change for reconciliation.
///
/// Recently added blocks are cached so a removed block's changes can be
/// derived again and unwound.
pub struct ReconcilingObserver {
    parser: Parser,
    tracker: Arc<BalanceTracker>,
    reconciler: Arc<Reconciler>,
    /// Added blocks, oldest first.
    recent_blocks: Mutex<VecDeque<Block>>,
    /// Maximum number of cached blocks; bounds the unwindable depth.
    capacity: usize,
}

impl ReconcilingObserver {
    /// Creates an observer able to unwind up to `capacity` blocks.
    pub fn new(
        parser: Parser,
        tracker: Arc<BalanceTracker>,
        reconciler: Arc<Reconciler>,
        capacity: usize,
    ) -> Self {
        Self {
            parser,
            tracker,
            reconciler,
            recent_blocks: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    async fn block_added(&self, block: &Block) -> anyhow::Result<()> {
        let changes = self.parser.balance_changes(block, false)?;
        self.tracker
            .add_block(&block.block_identifier, &changes)
            .await?;
        self.reconciler
            .queue_changes(&block.block_identifier, changes)
            .await?;

        let mut recent = self.recent_blocks.lock().await;
        recent.push_back(block.clone());
        while recent.len() > self.capacity {
            recent.pop_front();
        }
        Ok(())
    }

    async fn block_removed(&self, removed: &BlockIdentifier) -> anyhow::Result<()> {
        let block = {
            let mut recent = self.recent_blocks.lock().await;
            let is_tip = recent
                .back()
                .is_some_and(|last| last.block_identifier == *removed);
            if is_tip { recent.pop_back() } else { None }
        }
        .ok_or_else(|| anyhow!("removed block {removed} is not the last added block"))?;

        let reverted = self.parser.balance_changes(&block, true)?;
        self.tracker
            .remove_block(removed, &block.parent_block_identifier, &reverted)
            .await?;
        debug!(block = %removed, reverted = reverted.len(), "Reverted balance changes");
        Ok(())
    }
}

#[async_trait]
impl SyncObserver for ReconcilingObserver {
    async fn on_event(&self, event: &SyncEvent) -> anyhow::Result<()> {
        match event {
            SyncEvent::BlockAdded(block) => self.block_added(block).await,
            SyncEvent::BlockRemoved(removed) => self.block_removed(removed).await,
            SyncEvent::SyncCancelled => {
                debug!("Previous sync session cancelled");
                Ok(())
            }
        }
    }
}
