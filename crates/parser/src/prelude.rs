//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use blockcheck_parser::prelude::*;
//! ```

// Balance changes
pub use crate::balance_changes::{ExemptOperation, Parser};

// Errors
pub use crate::error::ParserError;

// Exemptions
pub use crate::exemptions::{
    BalanceExemption, ExemptionType, find_exemptions, match_balance_exemption,
};

// Grouping
pub use crate::grouping::{OperationGroup, group_operations};

// Intent
pub use crate::intent::expected_operation;

// Matching
pub use crate::matcher::{
    AccountDescription, AmountDescription, AmountSign, Descriptions, Match, MetadataDescription,
    MetadataValueKind, OperationDescription, match_operations,
};

// Validation
pub use crate::validator::{OperationValidator, StatusTable};
