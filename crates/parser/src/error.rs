//! Errors raised while parsing operations.

use blockcheck_domain::DomainError;

/// Parser errors.
///
/// Matching failures name the first violated constraint and are never
/// retried.
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    /// Malformed amount or arithmetic overflow.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// The injected operation validator failed.
    #[error("operation validator failed")]
    Validator(#[source] anyhow::Error),
    /// No description accepted an operation and unmatched operations are errors.
    #[error("unable to find match for operation at index {0}")]
    UnmatchedOperation(u64),
    /// A required description was not filled.
    #[error("could not find match for description {0}")]
    UnmatchedDescription(usize),
    /// A comparison names a description that does not exist.
    #[error("{check}: description {index} out of range ({len} descriptions)")]
    DescriptionOutOfRange {
        /// Comparison being evaluated.
        check: &'static str,
        /// Offending description index.
        index: usize,
        /// Number of descriptions.
        len: usize,
    },
    /// A comparison found fewer operations than it needs.
    #[error("{check}: requires at least {required} operations, found {found}")]
    TooFewOperations {
        /// Comparison being evaluated.
        check: &'static str,
        /// Minimum operations needed.
        required: usize,
        /// Operations found.
        found: usize,
    },
    /// A compared operation has no amount.
    #[error("{check}: operation {index} has no amount")]
    AmountMissing {
        /// Comparison being evaluated.
        check: &'static str,
        /// Operation index.
        index: u64,
    },
    /// A compared operation has no account.
    #[error("{check}: operation {index} has no account")]
    AccountMissing {
        /// Comparison being evaluated.
        check: &'static str,
        /// Operation index.
        index: u64,
    },
    /// Amounts that must be equal differ.
    #[error("equal amounts: {expected} != {found}")]
    AmountsNotEqual {
        /// First amount seen.
        expected: String,
        /// Differing amount.
        found: String,
    },
    /// Addresses that must be equal differ.
    #[error("equal addresses: {expected} != {found}")]
    AddressesNotEqual {
        /// First address seen.
        expected: String,
        /// Differing address.
        found: String,
    },
    /// Opposite-amount comparisons take exactly two descriptions.
    #[error("opposite amounts: expected 2 descriptions, got {0}")]
    OppositeAmountsArity(usize),
    /// Amounts that must be opposite are not.
    #[error("opposite amounts: {first} and {second} are not opposite")]
    AmountsNotOpposite {
        /// First amount.
        first: String,
        /// Second amount.
        second: String,
    },
    /// An intended and an observed operation differ.
    #[error("intended and observed operation differ in {0}")]
    OperationMismatch(&'static str),
    /// An observed operation has no intended counterpart.
    #[error("observed operation {0} was not intended")]
    ExtraOperation(u64),
    /// Intended operations were not observed.
    #[error("intended operations {0:?} were not observed")]
    MissingIntents(Vec<u64>),
    /// Matched observed operations were not successful.
    #[error("observed operations {0:?} were not successful")]
    UnsuccessfulOperations(Vec<u64>),
}
