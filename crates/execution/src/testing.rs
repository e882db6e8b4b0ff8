//! In-memory node used by the crate's tests.

use crate::error::FetchError;
use crate::fetcher::{AccountBalanceResponse, Fetcher};
use anyhow::anyhow;
use async_trait::async_trait;
use blockcheck_domain::entities::{AccountIdentifier, Block, NetworkStatus, Transaction};
use blockcheck_domain::value_objects::{
    Amount, BlockIdentifier, Currency, NetworkIdentifier, PartialBlockIdentifier,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Block with no transactions whose parent sits one height below.
pub(crate) fn block(index: u64, hash: &str, parent_hash: &str) -> Block {
    block_with(index, hash, parent_hash, Vec::new())
}

pub(crate) fn block_with(
    index: u64,
    hash: &str,
    parent_hash: &str,
    transactions: Vec<Transaction>,
) -> Block {
    Block::new(
        BlockIdentifier::new(index, hash),
        BlockIdentifier::new(index.saturating_sub(1), parent_hash),
        transactions,
    )
}

#[derive(Default)]
struct ChainState {
    blocks: BTreeMap<u64, Block>,
    /// (address, height) -> balance; missing heights fall back to the
    /// latest lower height.
    balances: HashMap<String, BTreeMap<u64, String>>,
    /// Currency reported instead of the requested one.
    reported_currency: Option<Currency>,
    single_fetches: usize,
}

impl ChainState {
    /// Canonical block matching `lookup`; a hash off the canonical chain
    /// is not found.
    fn canonical(&self, lookup: &PartialBlockIdentifier) -> Option<&Block> {
        let block = match lookup.index {
            Some(index) => self.blocks.get(&index),
            None => self.blocks.last_key_value().map(|(_, b)| b),
        }?;
        match &lookup.hash {
            Some(hash) if *hash != block.block_identifier.hash => None,
            _ => Some(block),
        }
    }
}

/// Canonical chain served from memory.
pub(crate) struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub(crate) fn new(blocks: Vec<Block>) -> Self {
        let state = ChainState {
            blocks: blocks.into_iter().map(|b| (b.index(), b)).collect(),
            ..ChainState::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Blocks `0..len` hashed by their height.
    pub(crate) fn linear(len: u64) -> Vec<Block> {
        (0..len)
            .map(|i| block(i, &i.to_string(), &i.saturating_sub(1).to_string()))
            .collect()
    }

    pub(crate) fn set_balance(&self, address: &str, index: u64, value: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .balances
            .entry(address.to_string())
            .or_default()
            .insert(index, value.to_string());
    }

    /// Reports balances in `currency` whatever currency is requested.
    pub(crate) fn report_currency(&self, currency: Currency) {
        self.state.lock().unwrap().reported_currency = Some(currency);
    }

    pub(crate) fn single_fetches(&self) -> usize {
        self.state.lock().unwrap().single_fetches
    }
}

#[async_trait]
impl Fetcher for MockChain {
    async fn network_status(
        &self,
        _network: &NetworkIdentifier,
    ) -> Result<NetworkStatus, FetchError> {
        let state = self.state.lock().unwrap();
        let (Some((_, genesis)), Some((_, head))) =
            (state.blocks.first_key_value(), state.blocks.last_key_value())
        else {
            return Err(FetchError::Transport("empty chain".to_string()));
        };
        Ok(NetworkStatus {
            current_block_identifier: head.block_identifier.clone(),
            current_block_timestamp: head.timestamp,
            genesis_block_identifier: genesis.block_identifier.clone(),
        })
    }

    async fn block_range(
        &self,
        _network: &NetworkIdentifier,
        start: u64,
        end: u64,
    ) -> Result<HashMap<u64, Block>, FetchError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .blocks
            .range(start..=end)
            .map(|(i, b)| (*i, b.clone()))
            .collect())
    }

    async fn block(
        &self,
        _network: &NetworkIdentifier,
        block: &PartialBlockIdentifier,
    ) -> Result<Block, FetchError> {
        let mut state = self.state.lock().unwrap();
        state.single_fetches += 1;
        state
            .canonical(block)
            .cloned()
            .ok_or_else(|| FetchError::Other(anyhow!("block {block:?} not found")))
    }

    async fn account_balance(
        &self,
        _network: &NetworkIdentifier,
        account: &AccountIdentifier,
        currency: &Currency,
        block: Option<&PartialBlockIdentifier>,
    ) -> Result<AccountBalanceResponse, FetchError> {
        let state = self.state.lock().unwrap();
        let at = state
            .canonical(block.unwrap_or(&PartialBlockIdentifier::default()))
            .ok_or_else(|| FetchError::Other(anyhow!("block {block:?} not found")))?;

        let value = state
            .balances
            .get(&account.address)
            .and_then(|history| history.range(..=at.index()).next_back())
            .map_or_else(|| "0".to_string(), |(_, v)| v.clone());

        Ok(AccountBalanceResponse {
            block_identifier: at.block_identifier.clone(),
            balances: vec![Amount::new(
                value,
                state.reported_currency.clone().unwrap_or_else(|| currency.clone()),
            )],
        })
    }
}
