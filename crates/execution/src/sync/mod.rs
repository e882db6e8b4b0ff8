//! Block syncing.
//!
//! Provides chain tracking via:
//! - A forward-walking syncer with a bounded window of accepted blocks
//! - One-step reorganization unwinding
//! - Synchronous event delivery to registered observers

mod events;
mod syncer;

pub use events::*;
pub use syncer::*;
