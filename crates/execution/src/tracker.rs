//! In-memory computed balances.

use crate::reconcile::{CachedBalance, ReconcilerHelper};
use anyhow::anyhow;
use async_trait::async_trait;
use blockcheck_domain::DomainError;
use blockcheck_domain::entities::AccountIdentifier;
use blockcheck_domain::value_objects::{
    AccountCurrency, BalanceChange, BlockIdentifier, Currency, IntegerAmount,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Blocks kept below the head unless configured otherwise.
pub const DEFAULT_REORG_DEPTH: u64 = 100;

#[derive(Debug, Default)]
struct TrackerState {
    /// Balance history per account-currency key, oldest first.
    balances: HashMap<String, Vec<CachedBalance>>,
    /// Canonical blocks by height.
    blocks: HashMap<u64, BlockIdentifier>,
    head: Option<BlockIdentifier>,
    first_block: Option<BlockIdentifier>,
    /// Heights below this were pruned and are final.
    pruned_below: u64,
}

/// Computed balances and the canonical chain they were computed from.
///
/// Blocks within the reorg depth keep their balance entries so a removed
/// block can be unwound exactly; anything older is pruned.
#[derive(Debug)]
pub struct BalanceTracker {
    state: RwLock<TrackerState>,
    /// Blocks kept below the head.
    reorg_depth: u64,
}

impl Default for BalanceTracker {
    fn default() -> Self {
        Self::with_reorg_depth(DEFAULT_REORG_DEPTH)
    }
}

impl BalanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker able to unwind up to `reorg_depth` blocks below the head.
    pub fn with_reorg_depth(reorg_depth: u64) -> Self {
        Self {
            state: RwLock::new(TrackerState::default()),
            reorg_depth,
        }
    }

    /// Seeds a known balance, e.g. a genesis allocation.
    ///
    /// # Errors
    /// Fails if the account-currency cannot be keyed.
    pub async fn set_balance(
        &self,
        entry: &AccountCurrency,
        amount: IntegerAmount,
        block: &BlockIdentifier,
    ) -> Result<(), DomainError> {
        let key = entry.key()?;
        self.state
            .write()
            .await
            .balances
            .entry(key)
            .or_default()
            .push(CachedBalance {
                amount,
                block: block.clone(),
            });
        Ok(())
    }

    /// Applies the changes of a newly added block and makes it the head.
    ///
    /// # Errors
    /// Fails if an account-currency cannot be keyed or a balance overflows.
    pub async fn add_block(
        &self,
        block: &BlockIdentifier,
        changes: &[BalanceChange],
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let cutoff = block
            .index
            .checked_sub(self.reorg_depth)
            .filter(|cutoff| *cutoff > state.pruned_below);

        for change in changes {
            let key = change.account_currency().key()?;
            let history = state.balances.entry(key).or_default();
            let current = history
                .last()
                .map_or_else(IntegerAmount::zero, |balance| balance.amount);
            history.push(CachedBalance {
                amount: current.checked_add(&change.difference)?,
                block: block.clone(),
            });
            if let Some(cutoff) = cutoff {
                // The latest entry at or below the cutoff still answers
                // lookups at heights above it.
                let keep_from = history
                    .iter()
                    .rposition(|balance| balance.block.index <= cutoff)
                    .unwrap_or(0);
                history.drain(..keep_from);
            }
        }

        state.blocks.insert(block.index, block.clone());
        if let Some(cutoff) = cutoff {
            state.blocks.retain(|index, _| *index >= cutoff);
            state.pruned_below = cutoff;
        }
        state.first_block.get_or_insert_with(|| block.clone());
        state.head = Some(block.clone());
        debug!(block = %block, changes = changes.len(), "Applied block");
        Ok(())
    }

    /// Unwinds `removed`, making `parent` the head.
    ///
    /// `reverted` names the balances the block touched.
    ///
    /// # Errors
    /// Fails if an account-currency cannot be keyed.
    pub async fn remove_block(
        &self,
        removed: &BlockIdentifier,
        parent: &BlockIdentifier,
        reverted: &[BalanceChange],
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;

        for change in reverted {
            let key = change.account_currency().key()?;
            let Some(history) = state.balances.get_mut(&key) else {
                continue;
            };
            if history.last().is_some_and(|balance| balance.block == *removed) {
                history.pop();
            }
            if history.is_empty() {
                state.balances.remove(&key);
            }
        }

        if state.blocks.get(&removed.index) == Some(removed) {
            state.blocks.remove(&removed.index);
        }
        if state.first_block.as_ref() == Some(removed) {
            state.first_block = None;
            state.head = None;
        } else {
            state.head = Some(parent.clone());
        }
        debug!(block = %removed, parent = %parent, "Unwound block");
        Ok(())
    }

    pub async fn head(&self) -> Option<BlockIdentifier> {
        self.state.read().await.head.clone()
    }
}

#[async_trait]
impl ReconcilerHelper for BalanceTracker {
    async fn current_block(&self) -> anyhow::Result<BlockIdentifier> {
        self.head()
            .await
            .ok_or_else(|| anyhow!("no block has been processed"))
    }

    /// Pruned heights are beyond the reorg depth and count as canonical.
    async fn block_exists(&self, block: &BlockIdentifier) -> anyhow::Result<bool> {
        let state = self.state.read().await;
        Ok(block.index < state.pruned_below || state.blocks.get(&block.index) == Some(block))
    }

    /// Latest balance at or below `head`; zero at the first processed block
    /// for accounts never touched.
    async fn account_balance(
        &self,
        account: &AccountIdentifier,
        currency: &Currency,
        head: &BlockIdentifier,
    ) -> anyhow::Result<CachedBalance> {
        let key = AccountCurrency::new(account.clone(), currency.clone()).key()?;
        let state = self.state.read().await;

        let latest = state.balances.get(&key).and_then(|history| {
            history
                .iter()
                .rev()
                .find(|balance| balance.block.index <= head.index)
        });
        if let Some(balance) = latest {
            return Ok(balance.clone());
        }

        Ok(CachedBalance {
            amount: IntegerAmount::zero(),
            block: state.first_block.clone().unwrap_or_else(|| head.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(address: &str, block: &BlockIdentifier, difference: i64) -> BalanceChange {
        BalanceChange {
            account: AccountIdentifier::new(address),
            currency: Currency::new("BTC", 8),
            block: block.clone(),
            difference: IntegerAmount::from(difference),
        }
    }

    async fn balance(
        tracker: &BalanceTracker,
        address: &str,
        head: &BlockIdentifier,
    ) -> CachedBalance {
        tracker
            .account_balance(&AccountIdentifier::new(address), &Currency::new("BTC", 8), head)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_tracker_has_no_head() {
        let tracker = BalanceTracker::new();
        assert!(tracker.current_block().await.is_err());
    }

    #[tokio::test]
    async fn test_add_and_remove_block() {
        let tracker = BalanceTracker::new();
        let b0 = BlockIdentifier::new(0, "0");
        let b1 = BlockIdentifier::new(1, "1");

        tracker.add_block(&b0, &[change("alice", &b0, 100)]).await.unwrap();
        tracker.add_block(&b1, &[change("alice", &b1, -30), change("bob", &b1, 30)]).await.unwrap();

        assert_eq!(tracker.current_block().await.unwrap(), b1);
        let alice = balance(&tracker, "alice", &b1).await;
        assert_eq!(alice.amount, IntegerAmount::from(70i64));
        assert_eq!(alice.block, b1);
        assert_eq!(balance(&tracker, "alice", &b0).await.amount, IntegerAmount::from(100i64));

        tracker
            .remove_block(&b1, &b0, &[change("alice", &b0, 30), change("bob", &b0, -30)])
            .await
            .unwrap();

        assert_eq!(tracker.current_block().await.unwrap(), b0);
        assert!(!tracker.block_exists(&b1).await.unwrap());
        assert!(tracker.block_exists(&b0).await.unwrap());
        let alice = balance(&tracker, "alice", &b0).await;
        assert_eq!(alice.amount, IntegerAmount::from(100i64));
        assert_eq!(alice.block, b0);
        let bob = balance(&tracker, "bob", &b0).await;
        assert!(bob.amount.is_zero());
        assert_eq!(bob.block, b0);
    }

    #[tokio::test]
    async fn test_block_exists_compares_hash() {
        let tracker = BalanceTracker::new();
        tracker.add_block(&BlockIdentifier::new(0, "a"), &[]).await.unwrap();

        assert!(tracker.block_exists(&BlockIdentifier::new(0, "a")).await.unwrap());
        assert!(!tracker.block_exists(&BlockIdentifier::new(0, "b")).await.unwrap());
    }

    #[tokio::test]
    async fn test_seeded_balance() {
        let tracker = BalanceTracker::new();
        let b0 = BlockIdentifier::new(0, "0");
        let entry = AccountCurrency::new(AccountIdentifier::new("alice"), Currency::new("BTC", 8));

        tracker.set_balance(&entry, IntegerAmount::from(50u64), &b0).await.unwrap();
        tracker.add_block(&b0, &[change("alice", &b0, 5)]).await.unwrap();

        assert_eq!(balance(&tracker, "alice", &b0).await.amount, IntegerAmount::from(55u64));
    }

    #[tokio::test]
    async fn test_history_is_pruned_beyond_reorg_depth() {
        let tracker = BalanceTracker::with_reorg_depth(2);
        for i in 0..6u64 {
            let b = BlockIdentifier::new(i, i.to_string());
            tracker.add_block(&b, &[change("alice", &b, 10)]).await.unwrap();
        }

        let head = BlockIdentifier::new(5, "5");
        let key = AccountCurrency::new(AccountIdentifier::new("alice"), Currency::new("BTC", 8))
            .key()
            .unwrap();
        {
            let state = tracker.state.read().await;
            assert_eq!(state.blocks.len(), 3);
            assert_eq!(state.balances[&key].len(), 3);
            assert_eq!(state.pruned_below, 3);
        }

        assert_eq!(balance(&tracker, "alice", &head).await.amount, IntegerAmount::from(60u64));
        let oldest_kept = BlockIdentifier::new(3, "3");
        assert_eq!(
            balance(&tracker, "alice", &oldest_kept).await.amount,
            IntegerAmount::from(40u64)
        );
        assert!(tracker.block_exists(&BlockIdentifier::new(1, "1")).await.unwrap());
        assert!(!tracker.block_exists(&BlockIdentifier::new(4, "x")).await.unwrap());

        // A block within the reorg depth still unwinds exactly.
        tracker
            .remove_block(&head, &BlockIdentifier::new(4, "4"), &[change("alice", &head, -10)])
            .await
            .unwrap();
        let parent = BlockIdentifier::new(4, "4");
        assert_eq!(balance(&tracker, "alice", &parent).await.amount, IntegerAmount::from(50u64));
    }
}
