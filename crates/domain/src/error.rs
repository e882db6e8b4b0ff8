//! Errors raised by domain value objects.

/// Domain errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Amount string is not a signed base-10 integer.
    #[error("invalid amount {0:?}: expected a signed base-10 integer")]
    InvalidAmount(String),
    /// Arithmetic result does not fit in 256 bits.
    #[error("amount overflow: {lhs} {op} {rhs}")]
    AmountOverflow {
        /// Left operand.
        lhs: String,
        /// Operator.
        op: char,
        /// Right operand.
        rhs: String,
    },
    /// Value could not be encoded into a canonical key.
    #[error("unable to encode {what}: {reason}")]
    Encoding {
        /// What was being encoded.
        what: &'static str,
        /// Underlying reason.
        reason: String,
    },
}
