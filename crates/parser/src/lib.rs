//! Operation parsing for chain consistency checking.
//!
//! This crate turns the flat operation lists of transactions into
//! higher-level facts:
//! - Grouping of related operations into multi-leg actions
//! - Declarative pattern matching of operations
//! - Net balance changes per account and currency for a block
//! - Comparison of intended and observed operations
//!
//! Everything here is synchronous; no function performs I/O.

/// Prelude module for convenient imports.
pub mod prelude;

/// Balance change derivation.
pub mod balance_changes;
/// Parser errors.
pub mod error;
/// Balance exemptions.
pub mod exemptions;
/// Operation grouping.
pub mod grouping;
/// Intent comparison.
pub mod intent;
/// Operation pattern matching.
pub mod matcher;
/// Operation status validation.
pub mod validator;

pub use error::ParserError;
