//! Chain tracking and balance reconciliation.
//!
//! This crate provides the long-running parts of consistency checking:
//! - Block syncing with reorganization detection and unwinding
//! - Balance reconciliation on active and inactive schedules
//! - In-memory computed balances for reconciliation
//! - A pipeline wiring synced blocks through the parser into the reconciler
//!
//! All node I/O goes through the injected [`fetcher::Fetcher`].

/// Prelude module for convenient imports.
pub mod prelude;

/// Error types.
pub mod error;
/// Node fetch collaborator.
pub mod fetcher;
/// Syncer to reconciler wiring.
pub mod pipeline;
/// Balance reconciliation.
pub mod reconcile;
/// Block syncing.
pub mod sync;
/// In-memory computed balances.
pub mod tracker;

#[cfg(test)]
pub(crate) mod testing;
