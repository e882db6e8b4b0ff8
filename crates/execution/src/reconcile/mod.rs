//! Balance reconciliation.
//!
//! Proves that balances computed from parsed blocks match the balances a
//! node reports, on two schedules:
//! - Active: right after a block changes an account's balance
//! - Inactive: periodically, for every account seen so far

mod reconciler;

pub use reconciler::*;

use async_trait::async_trait;
use blockcheck_domain::entities::AccountIdentifier;
use blockcheck_domain::value_objects::{BlockIdentifier, Currency, IntegerAmount};
use blockcheck_parser::prelude::BalanceExemption;
use serde::{Deserialize, Serialize};

/// Schedule that triggered a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationKind {
    /// Triggered by a balance change in a processed block.
    Active,
    /// Periodic check of a previously seen account.
    Inactive,
}

/// A computed balance and the block that last changed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBalance {
    pub amount: IntegerAmount,
    pub block: BlockIdentifier,
}

/// Access to computed balances and the processed chain.
#[async_trait]
pub trait ReconcilerHelper: Send + Sync {
    /// Last processed block.
    async fn current_block(&self) -> anyhow::Result<BlockIdentifier>;

    /// Whether `block` is still part of the processed chain.
    async fn block_exists(&self, block: &BlockIdentifier) -> anyhow::Result<bool>;

    /// Computed balance as of `head`.
    async fn account_balance(
        &self,
        account: &AccountIdentifier,
        currency: &Currency,
        head: &BlockIdentifier,
    ) -> anyhow::Result<CachedBalance>;
}

/// Receives reconciliation results.
#[async_trait]
pub trait ReconcilerHandler: Send + Sync {
    async fn reconciliation_succeeded(
        &self,
        kind: ReconciliationKind,
        account: &AccountIdentifier,
        currency: &Currency,
        balance: &IntegerAmount,
        block: &BlockIdentifier,
    ) -> anyhow::Result<()>;

    /// Called on a mismatch. Returning an error stops the reconciler;
    /// returning `Ok` treats the mismatch as advisory.
    async fn reconciliation_failed(
        &self,
        kind: ReconciliationKind,
        account: &AccountIdentifier,
        currency: &Currency,
        computed: &IntegerAmount,
        live: &IntegerAmount,
        block: &BlockIdentifier,
    ) -> anyhow::Result<()>;

    /// Called when balances differ by an amount `exemption` tolerates.
    #[allow(clippy::too_many_arguments)]
    async fn reconciliation_exempt(
        &self,
        _kind: ReconciliationKind,
        _account: &AccountIdentifier,
        _currency: &Currency,
        _computed: &IntegerAmount,
        _live: &IntegerAmount,
        _block: &BlockIdentifier,
        _exemption: &BalanceExemption,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
