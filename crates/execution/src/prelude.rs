//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use blockcheck_execution::prelude::*;
//! ```

// Errors
pub use crate::error::{FetchError, ProtocolViolation, ReconcilerError, SyncError};

// Fetcher
pub use crate::fetcher::{AccountBalanceResponse, Fetcher};

// Pipeline
pub use crate::pipeline::ReconcilingObserver;

// Reconcile
pub use crate::reconcile::{
    CachedBalance, ComparisonOutcome, InactiveEntry, Reconciler, ReconcilerConfig,
    ReconcilerHandler, ReconcilerHelper, ReconciliationKind, ReconciliationOutcome,
};

// Sync
pub use crate::sync::{ChannelObserver, SyncEvent, SyncObserver, Syncer, SyncerConfig};

// Tracker
pub use crate::tracker::BalanceTracker;
