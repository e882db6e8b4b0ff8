//! Node fetch collaborator.
//!
//! Implementations own transport, retries and timeouts. The syncer and the
//! reconciler call them once per request and treat every error as fatal.

use crate::error::FetchError;
use async_trait::async_trait;
use blockcheck_domain::entities::{AccountIdentifier, Block, NetworkStatus};
use blockcheck_domain::value_objects::{
    Amount, BlockIdentifier, Currency, NetworkIdentifier, PartialBlockIdentifier,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Live balances of an account at a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalanceResponse {
    pub block_identifier: BlockIdentifier,
    pub balances: Vec<Amount>,
}

impl AccountBalanceResponse {
    /// Balance in `currency`, if reported.
    pub fn currency_balance(&self, currency: &Currency) -> Option<&Amount> {
        self.balances
            .iter()
            .find(|amount| amount.currency == *currency)
    }
}

/// Fetches already-decoded data from a node.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Current head and genesis of the network.
    async fn network_status(
        &self,
        network: &NetworkIdentifier,
    ) -> Result<NetworkStatus, FetchError>;

    /// Identifier of the current head.
    async fn current_head(
        &self,
        network: &NetworkIdentifier,
    ) -> Result<BlockIdentifier, FetchError> {
        Ok(self.network_status(network).await?.current_block_identifier)
    }

    /// Best-effort bulk fetch of heights `start..=end`, keyed by height.
    ///
    /// Heights may be missing, and blocks may be stale after a reorg.
    async fn block_range(
        &self,
        network: &NetworkIdentifier,
        start: u64,
        end: u64,
    ) -> Result<HashMap<u64, Block>, FetchError>;

    /// A single block.
    async fn block(
        &self,
        network: &NetworkIdentifier,
        block: &PartialBlockIdentifier,
    ) -> Result<Block, FetchError>;

    /// Balances of `account` at `block`, or at the head when `None`.
    async fn account_balance(
        &self,
        network: &NetworkIdentifier,
        account: &AccountIdentifier,
        currency: &Currency,
        block: Option<&PartialBlockIdentifier>,
    ) -> Result<AccountBalanceResponse, FetchError>;
}
