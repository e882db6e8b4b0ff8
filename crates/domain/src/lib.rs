//! Core data model for chain consistency checking.
//!
//! This crate provides the shared vocabulary of the workspace:
//! - Block, transaction and operation entities
//! - Account and currency identifiers
//! - Exact signed integer amounts
//! - Balance changes and account-currency reconciliation units

/// Entities decoded from node responses.
pub mod entities;
/// Domain errors.
pub mod error;
/// Value objects shared across entities.
pub mod value_objects;

pub use error::DomainError;

/// Arbitrary key/value metadata attached to protocol objects.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
