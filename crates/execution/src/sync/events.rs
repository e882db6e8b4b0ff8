//! Sync events and observers.

use async_trait::async_trait;
use blockcheck_domain::entities::Block;
use blockcheck_domain::value_objects::BlockIdentifier;
use tokio::sync::mpsc;
use tracing::debug;

/// Event emitted by the syncer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A block was accepted at the tip.
    BlockAdded(Block),
    /// The tip block was orphaned and unwound.
    BlockRemoved(BlockIdentifier),
    /// A new sync session started; any prior session must stop.
    SyncCancelled,
}

/// Receives sync events.
///
/// Events are delivered in order and awaited within the syncer's
/// processing step. An error aborts the sync.
#[async_trait]
pub trait SyncObserver: Send + Sync {
    async fn on_event(&self, event: &SyncEvent) -> anyhow::Result<()>;
}

/// Observer forwarding events to a channel.
pub struct ChannelObserver {
    tx: mpsc::Sender<SyncEvent>,
}

impl ChannelObserver {
    /// Creates an observer and the receiver for its events.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<SyncEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SyncObserver for ChannelObserver {
    async fn on_event(&self, event: &SyncEvent) -> anyhow::Result<()> {
        self.tx.send(event.clone()).await?;
        debug!(event = event_kind(event), "Forwarded sync event");
        Ok(())
    }
}

fn event_kind(event: &SyncEvent) -> &'static str {
    match event {
        SyncEvent::BlockAdded(_) => "block_added",
        SyncEvent::BlockRemoved(_) => "block_removed",
        SyncEvent::SyncCancelled => "sync_cancelled",
    }
}
