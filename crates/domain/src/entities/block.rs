//! Blocks and transactions.

use crate::Metadata;
use crate::entities::operation::Operation;
use crate::value_objects::identifiers::{BlockIdentifier, TransactionIdentifier};
use serde::{Deserialize, Serialize};

/// A block as returned by a node.
///
/// The parent's index is lower than the block's own, except for genesis
/// whose parent may be itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub block_identifier: BlockIdentifier,
    pub parent_block_identifier: BlockIdentifier,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Block {
    pub fn new(
        block_identifier: BlockIdentifier,
        parent_block_identifier: BlockIdentifier,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            block_identifier,
            parent_block_identifier,
            timestamp: 0,
            transactions,
            metadata: None,
        }
    }

    pub fn index(&self) -> u64 {
        self.block_identifier.index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_identifier: TransactionIdentifier,
    pub operations: Vec<Operation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Transaction {
    pub fn new(hash: impl Into<String>, operations: Vec<Operation>) -> Self {
        Self {
            transaction_identifier: TransactionIdentifier { hash: hash.into() },
            operations,
            metadata: None,
        }
    }
}

/// Node status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkStatus {
    pub current_block_identifier: BlockIdentifier,
    pub current_block_timestamp: i64,
    pub genesis_block_identifier: BlockIdentifier,
}
