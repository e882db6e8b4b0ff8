//! Forward-walking block syncer with reorganization unwinding.

use crate::error::{ProtocolViolation, SyncError};
use crate::fetcher::Fetcher;
use crate::sync::{SyncEvent, SyncObserver};
use blockcheck_domain::entities::Block;
use blockcheck_domain::value_objects::{BlockIdentifier, NetworkIdentifier, PartialBlockIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the syncer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncerConfig {
    /// Number of accepted block identifiers kept for reorg detection.
    pub past_block_size: usize,
    /// Maximum heights fetched per range.
    pub max_sync: u64,
    /// Wait before polling the head again once caught up, in milliseconds.
    pub sync_sleep_ms: u64,
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            past_block_size: 20,
            max_sync: 64,
            sync_sleep_ms: 2_000,
        }
    }
}

/// Walks the chain forward, one height at a time.
///
/// Only the syncer's own methods mutate its window, and it never processes
/// two heights at once.
pub struct Syncer {
    /// Network being synced.
    network: NetworkIdentifier,
    /// Node access.
    fetcher: Arc<dyn Fetcher>,
    /// Configuration.
    config: SyncerConfig,
    /// Registered observers, notified in registration order.
    observers: Vec<Arc<dyn SyncObserver>>,
    /// Height of the next block to accept.
    next_index: u64,
    /// Recently accepted blocks, oldest first.
    past_blocks: VecDeque<BlockIdentifier>,
    /// Genesis of the network, learned from network status.
    genesis_block: Option<BlockIdentifier>,
}

impl Syncer {
    /// Creates a new syncer.
    pub fn new(
        network: NetworkIdentifier,
        fetcher: Arc<dyn Fetcher>,
        config: SyncerConfig,
    ) -> Self {
        Self {
            network,
            fetcher,
            config,
            observers: Vec::new(),
            next_index: 0,
            past_blocks: VecDeque::new(),
            genesis_block: None,
        }
    }

    /// Registers an observer for sync events.
    pub fn subscribe(&mut self, observer: Arc<dyn SyncObserver>) {
        self.observers.push(observer);
    }

    /// Height of the next block to accept.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Accepted block identifiers, oldest first.
    pub fn past_blocks(&self) -> impl Iterator<Item = &BlockIdentifier> {
        self.past_blocks.iter()
    }

    pub fn genesis_block(&self) -> Option<&BlockIdentifier> {
        self.genesis_block.as_ref()
    }

    async fn emit(&self, event: SyncEvent) -> Result<(), SyncError> {
        for observer in &self.observers {
            observer.on_event(&event).await.map_err(SyncError::Observer)?;
        }
        Ok(())
    }

    /// Sets the next height to sync: `start_index`, or genesis when `None`.
    ///
    /// Network status is always fetched so the genesis block is known.
    /// Moving the start discards the window of accepted blocks.
    ///
    /// # Errors
    /// Fails if network status cannot be fetched.
    pub async fn set_start(&mut self, start_index: Option<u64>) -> Result<(), SyncError> {
        let status = self.fetcher.network_status(&self.network).await?;
        let start = start_index.unwrap_or(status.genesis_block_identifier.index);
        self.genesis_block = Some(status.genesis_block_identifier);

        if start != self.next_index {
            self.past_blocks.clear();
        }
        self.next_index = start;
        Ok(())
    }

    /// Highest height of the next range to sync, or `None` when caught up.
    ///
    /// # Errors
    /// Fails if the head cannot be fetched.
    pub async fn next_syncable_range(
        &self,
        end_index: Option<u64>,
    ) -> Result<Option<u64>, SyncError> {
        let head = self.fetcher.current_head(&self.network).await?;
        let end = end_index.map_or(head.index, |end| end.min(head.index));

        if self.next_index > end {
            return Ok(None);
        }

        let span = self.config.max_sync.max(1) - 1;
        Ok(Some(end.min(self.next_index.saturating_add(span))))
    }

    /// Accepts `block` at the tip, or unwinds the tip if `block` does not
    /// extend it.
    ///
    /// On a reorg, the tip is removed and the block is not accepted; the
    /// caller fetches the new block at the unwound height next.
    ///
    /// # Errors
    /// Fails with a [`ProtocolViolation`] if the block is not at the next
    /// height or the unwind would remove genesis, or if an observer fails.
    pub async fn process_block(&mut self, block: Block) -> Result<(), SyncError> {
        if block.index() != self.next_index {
            return Err(ProtocolViolation::UnexpectedHeight {
                expected: self.next_index,
                got: block.index(),
            }
            .into());
        }

        if let Some(last) = self.past_blocks.back()
            && block.parent_block_identifier != *last
        {
            let last = last.clone();
            if self.genesis_block.as_ref() == Some(&last) {
                return Err(ProtocolViolation::GenesisUnwind(last).into());
            }

            warn!(
                removed = %last,
                incoming = %block.block_identifier,
                parent = %block.parent_block_identifier,
                "Reorg detected, removing block"
            );
            self.emit(SyncEvent::BlockRemoved(last.clone())).await?;
            self.past_blocks.pop_back();
            self.next_index = last.index;
            return Ok(());
        }

        let identifier = block.block_identifier.clone();
        debug!(block = %identifier, txs = block.transactions.len(), "Block added");
        self.emit(SyncEvent::BlockAdded(block)).await?;

        self.past_blocks.push_back(identifier.clone());
        while self.past_blocks.len() > self.config.past_block_size {
            self.past_blocks.pop_front();
        }
        self.next_index = identifier.index + 1;
        Ok(())
    }

    /// Processes heights from the next index through `end_index`.
    ///
    /// Blocks come from one bulk fetch; each fetched block is used at most
    /// once, so a height revisited after a reorg is fetched again.
    ///
    /// # Errors
    /// Fails on any fetch error or processing error.
    pub async fn sync_range(&mut self, end_index: u64) -> Result<(), SyncError> {
        let mut blocks = self
            .fetcher
            .block_range(&self.network, self.next_index, end_index)
            .await?;

        while self.next_index <= end_index {
            let block = match blocks.remove(&self.next_index) {
                Some(block) => block,
                None => {
                    debug!(index = self.next_index, "Fetching block missing from range");
                    self.fetcher
                        .block(&self.network, &PartialBlockIdentifier::at_index(self.next_index))
                        .await?
                }
            };
            self.process_block(block).await?;
        }
        Ok(())
    }

    /// Syncs from `start_index` (genesis when `None`) to `end_index`.
    ///
    /// With `end_index` of `None`, follows the head forever. Emits
    /// [`SyncEvent::SyncCancelled`] first so observers of a previous session
    /// can stop.
    ///
    /// # Errors
    /// Fails on any fetch, protocol or observer error.
    pub async fn sync(
        &mut self,
        start_index: Option<u64>,
        end_index: Option<u64>,
    ) -> Result<(), SyncError> {
        self.emit(SyncEvent::SyncCancelled).await?;
        self.set_start(start_index).await?;

        let start = self.next_index;
        info!(
            network = %self.network.network,
            start,
            end = ?end_index,
            "Starting sync"
        );

        loop {
            match self.next_syncable_range(end_index).await? {
                Some(range_end) => self.sync_range(range_end).await?,
                None => {
                    if let Some(end) = end_index
                        && self.next_index > end
                    {
                        break;
                    }
                    debug!(next_index = self.next_index, "Caught up with head, waiting");
                    tokio::time::sleep(Duration::from_millis(self.config.sync_sleep_ms)).await;
                }
            }
        }

        info!(start, end = ?end_index, "Finished syncing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::ChannelObserver;
    use crate::testing::{MockChain, block};
    use tokio::sync::mpsc;

    fn syncer(chain: Arc<MockChain>, config: SyncerConfig) -> (Syncer, mpsc::Receiver<SyncEvent>) {
        let mut syncer = Syncer::new(NetworkIdentifier::new("bitcoin", "mainnet"), chain, config);
        let (observer, rx) = ChannelObserver::new(256);
        syncer.subscribe(Arc::new(observer));
        (syncer, rx)
    }

    fn drain(rx: &mut mpsc::Receiver<SyncEvent>) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_reorg_scenario() {
        let genesis = block(0, "0", "0");
        let chain = Arc::new(MockChain::new(vec![genesis.clone(), block(1, "1a", "0")]));
        let (mut syncer, mut rx) = syncer(chain, SyncerConfig::default());

        syncer.set_start(None).await.unwrap();
        syncer.process_block(genesis).await.unwrap();
        syncer.process_block(block(1, "1", "0")).await.unwrap();
        assert_eq!(syncer.next_index(), 2);

        syncer.process_block(block(2, "2", "1a")).await.unwrap();

        assert_eq!(syncer.next_index(), 1);
        assert_eq!(
            syncer.past_blocks().cloned().collect::<Vec<_>>(),
            vec![BlockIdentifier::new(0, "0")]
        );
        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert_eq!(
            events[2],
            SyncEvent::BlockRemoved(BlockIdentifier::new(1, "1"))
        );
    }

    #[tokio::test]
    async fn test_genesis_unwind_is_fatal() {
        let genesis = block(0, "0", "0");
        let chain = Arc::new(MockChain::new(vec![genesis.clone()]));
        let (mut syncer, _rx) = syncer(chain, SyncerConfig::default());

        syncer.set_start(None).await.unwrap();
        syncer.process_block(genesis).await.unwrap();

        let err = syncer.process_block(block(1, "1", "x")).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::ProtocolViolation(ProtocolViolation::GenesisUnwind(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_height_is_fatal() {
        let chain = Arc::new(MockChain::new(vec![block(0, "0", "0")]));
        let (mut syncer, _rx) = syncer(chain, SyncerConfig::default());
        syncer.set_start(None).await.unwrap();

        let err = syncer.process_block(block(5, "5", "4")).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::ProtocolViolation(ProtocolViolation::UnexpectedHeight {
                expected: 0,
                got: 5
            })
        ));
    }

    #[tokio::test]
    async fn test_window_is_bounded() {
        let blocks = MockChain::linear(6);
        let chain = Arc::new(MockChain::new(blocks.clone()));
        let config = SyncerConfig {
            past_block_size: 3,
            ..SyncerConfig::default()
        };
        let (mut syncer, _rx) = syncer(chain, config);
        syncer.set_start(None).await.unwrap();

        for (i, b) in blocks.into_iter().enumerate() {
            syncer.process_block(b).await.unwrap();
            assert_eq!(syncer.next_index(), i as u64 + 1);
            assert!(syncer.past_blocks().count() <= 3);
        }
        let window: Vec<u64> = syncer.past_blocks().map(|b| b.index).collect();
        assert_eq!(window, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_next_syncable_range() {
        let chain = Arc::new(MockChain::new(MockChain::linear(10)));
        let config = SyncerConfig {
            max_sync: 4,
            ..SyncerConfig::default()
        };
        let (mut syncer, _rx) = syncer(chain, config);
        syncer.set_start(Some(2)).await.unwrap();

        assert_eq!(syncer.next_syncable_range(None).await.unwrap(), Some(5));
        assert_eq!(syncer.next_syncable_range(Some(3)).await.unwrap(), Some(3));
        assert_eq!(syncer.next_syncable_range(Some(100)).await.unwrap(), Some(5));
        assert_eq!(syncer.next_syncable_range(Some(1)).await.unwrap(), None);

        syncer.set_start(Some(10)).await.unwrap();
        assert_eq!(syncer.next_syncable_range(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sync_to_finite_end() {
        let chain = Arc::new(MockChain::new(MockChain::linear(5)));
        let config = SyncerConfig {
            max_sync: 2,
            sync_sleep_ms: 1,
            ..SyncerConfig::default()
        };
        let (mut syncer, mut rx) = syncer(chain, config);

        syncer.sync(None, Some(3)).await.unwrap();

        assert_eq!(syncer.next_index(), 4);
        let events = drain(&mut rx);
        assert_eq!(events[0], SyncEvent::SyncCancelled);
        let added: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SyncEvent::BlockAdded(b) => Some(b.index()),
                _ => None,
            })
            .collect();
        assert_eq!(added, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sync_range_refetches_after_stale_batch() {
        let genesis = block(0, "0", "0");
        let chain = Arc::new(MockChain::new(vec![
            genesis.clone(),
            block(1, "1a", "0"),
            block(2, "2", "1a"),
        ]));
        let (mut syncer, mut rx) = syncer(chain.clone(), SyncerConfig::default());
        syncer.set_start(None).await.unwrap();
        syncer.process_block(genesis).await.unwrap();
        syncer.process_block(block(1, "1", "0")).await.unwrap();
        drain(&mut rx);

        syncer.sync_range(2).await.unwrap();

        assert_eq!(syncer.next_index(), 3);
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                SyncEvent::BlockRemoved(BlockIdentifier::new(1, "1")),
                SyncEvent::BlockAdded(block(1, "1a", "0")),
                SyncEvent::BlockAdded(block(2, "2", "1a")),
            ]
        );
        assert_eq!(chain.single_fetches(), 2);
    }

    #[tokio::test]
    async fn test_observer_failure_aborts() {
        let chain = Arc::new(MockChain::new(MockChain::linear(2)));
        let (mut syncer, rx) = syncer(chain, SyncerConfig::default());
        drop(rx);

        let err = syncer.sync(None, Some(1)).await.unwrap_err();
        assert!(matches!(err, SyncError::Observer(_)));
    }
}
