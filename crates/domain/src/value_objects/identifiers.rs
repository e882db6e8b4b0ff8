use serde::{Deserialize, Serialize};
use std::fmt;

/// Uniquely identifies a block: height plus hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockIdentifier {
    /// Height; the genesis block is not necessarily at zero.
    pub index: u64,
    /// Block hash.
    pub hash: String,
}

impl BlockIdentifier {
    pub fn new(index: u64, hash: impl Into<String>) -> Self {
        Self {
            index,
            hash: hash.into(),
        }
    }
}

impl fmt::Display for BlockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.index, self.hash)
    }
}

/// Block lookup key where either field may be omitted.
///
/// An empty identifier asks the node for its current head.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialBlockIdentifier {
    /// Height to look up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,
    /// Hash the block at `index` must have.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl PartialBlockIdentifier {
    /// Looks a block up by height only.
    pub fn at_index(index: u64) -> Self {
        Self {
            index: Some(index),
            hash: None,
        }
    }
}

impl From<&BlockIdentifier> for PartialBlockIdentifier {
    fn from(id: &BlockIdentifier) -> Self {
        Self {
            index: Some(id.index),
            hash: Some(id.hash.clone()),
        }
    }
}

/// Identifies the chain and network a request targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkIdentifier {
    pub blockchain: String,
    pub network: String,
}

impl NetworkIdentifier {
    pub fn new(blockchain: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            blockchain: blockchain.into(),
            network: network.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionIdentifier {
    pub hash: String,
}

/// Position of an operation within its transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationIdentifier {
    /// Dense index starting at 0.
    pub index: u64,
    /// Chain-native index, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_index: Option<i64>,
}

impl OperationIdentifier {
    pub fn new(index: u64) -> Self {
        Self {
            index,
            network_index: None,
        }
    }
}

/// Identifies a UTXO-style coin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoinIdentifier {
    pub identifier: String,
}
