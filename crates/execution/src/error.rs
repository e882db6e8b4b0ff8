//! Failure vocabulary shared by the syncer and the reconciler.

use blockcheck_domain::DomainError;
use blockcheck_domain::value_objects::BlockIdentifier;

/// Failure reported by the fetch collaborator.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network transport failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Any other fetch failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Node behaviour that breaks the syncing protocol.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// A block arrived for a height other than the next one.
    #[error("got block at height {got}, expected height {expected}")]
    UnexpectedHeight {
        /// Height the syncer expected.
        expected: u64,
        /// Height of the received block.
        got: u64,
    },
    /// A reorganization tried to unwind the genesis block.
    #[error("cannot remove genesis block {0}")]
    GenesisUnwind(BlockIdentifier),
}

/// Syncer errors. All are fatal to the sync session.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] ProtocolViolation),
    #[error("fetch failed")]
    Fetch(#[from] FetchError),
    #[error("sync observer failed")]
    Observer(#[source] anyhow::Error),
}

/// Reconciler errors. All are fatal to the reconciler.
#[derive(Debug, thiserror::Error)]
pub enum ReconcilerError {
    #[error("fetch failed")]
    Fetch(#[from] FetchError),
    #[error("reconciler helper failed")]
    Helper(#[source] anyhow::Error),
    /// The handler asked to abort, usually on a balance mismatch.
    #[error("reconciliation handler aborted")]
    Handler(#[source] anyhow::Error),
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// The live balance response lacks the requested currency.
    #[error("no {currency} balance reported at block {block}")]
    CurrencyNotFound {
        /// Requested currency symbol.
        currency: String,
        /// Block of the response.
        block: BlockIdentifier,
    },
    /// A reconciliation worker panicked or was cancelled.
    #[error("reconciliation worker stopped: {0}")]
    Worker(String),
}
