//! Reconciler with active and inactive schedules.

use super::{CachedBalance, ReconcilerHandler, ReconcilerHelper, ReconciliationKind};
use crate::error::ReconcilerError;
use crate::fetcher::Fetcher;
use blockcheck_domain::entities::AccountIdentifier;
use blockcheck_domain::value_objects::{
    AccountCurrency, BalanceChange, BlockIdentifier, Currency, IntegerAmount, NetworkIdentifier,
    PartialBlockIdentifier,
};
use blockcheck_parser::prelude::{BalanceExemption, find_exemptions, match_balance_exemption};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Fetch live balances at the block of the change instead of at the head.
    pub lookup_balance_by_block: bool,
    /// Blocks between two inactive checks of the same account.
    pub inactive_frequency: u64,
    /// Largest head lag still worth waiting for.
    pub wait_to_check_diff: u64,
    /// Wait between head checks while the head lags, in milliseconds.
    pub wait_to_check_diff_sleep_ms: u64,
    /// Wait of an idle inactive worker, in milliseconds.
    pub inactive_sleep_ms: u64,
    /// Number of active workers.
    pub active_concurrency: usize,
    /// Number of inactive workers.
    pub inactive_concurrency: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            lookup_balance_by_block: true,
            inactive_frequency: 200,
            wait_to_check_diff: 10,
            wait_to_check_diff_sleep_ms: 5_000,
            inactive_sleep_ms: 5_000,
            active_concurrency: 8,
            inactive_concurrency: 4,
        }
    }
}

/// Result of comparing a computed balance with a live one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonOutcome {
    /// Both balances refer to comparable blocks.
    Compared {
        /// Computed minus live.
        difference: IntegerAmount,
        /// Computed balance.
        cached_balance: IntegerAmount,
        /// Processed head at comparison time.
        head_index: u64,
    },
    /// The live balance is ahead of the processed head.
    HeadBehindLive {
        /// Processed head at comparison time.
        head_index: u64,
    },
    /// The live block is no longer part of the processed chain.
    BlockGone,
    /// The computed balance changed after the live block.
    AccountUpdated,
}

/// How a single reconciliation attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Balances are equal.
    Reconciled,
    /// Balances differ by an amount a balance exemption tolerates.
    Exempt,
    /// Balances differ and the handler let the reconciler continue.
    Mismatch,
    /// Abandoned; the account is retried on its normal schedule.
    Skipped,
}

/// Entry of the inactive schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactiveEntry {
    /// Account-currency to revisit.
    pub entry: AccountCurrency,
    /// Block of the last check, `None` if never checked.
    pub last_check: Option<BlockIdentifier>,
}

impl InactiveEntry {
    /// Whether the entry may be checked again at `head`.
    pub fn is_due(&self, head: &BlockIdentifier, frequency: u64) -> bool {
        self.last_check
            .as_ref()
            .is_none_or(|last| head.index >= last.index.saturating_add(frequency))
    }
}

/// Queues shared by all workers, guarded by one lock.
#[derive(Default)]
struct ReconcilerState {
    change_queue: VecDeque<BalanceChange>,
    inactive_queue: VecDeque<InactiveEntry>,
    /// Keys of account-currencies already on the inactive schedule.
    seen_accounts: HashSet<String>,
    /// Changes below this height are dropped by active workers.
    high_water_mark: u64,
}

/// Compares computed balances against balances reported by the node.
pub struct Reconciler {
    /// Network being reconciled.
    network: NetworkIdentifier,
    /// Node access for live balances.
    fetcher: Arc<dyn Fetcher>,
    /// Computed balances.
    helper: Arc<dyn ReconcilerHelper>,
    /// Result sink.
    handler: Arc<dyn ReconcilerHandler>,
    /// Configuration.
    config: ReconcilerConfig,
    /// Accounts checked on every block, changed or not.
    interesting_accounts: Vec<AccountCurrency>,
    /// Tolerated deviations of live from computed balances.
    exemptions: Vec<BalanceExemption>,
    state: Mutex<ReconcilerState>,
    /// Signalled whenever a change is queued.
    changes_available: Notify,
}

impl Reconciler {
    /// Creates a new reconciler.
    pub fn new(
        network: NetworkIdentifier,
        fetcher: Arc<dyn Fetcher>,
        helper: Arc<dyn ReconcilerHelper>,
        handler: Arc<dyn ReconcilerHandler>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            network,
            fetcher,
            helper,
            handler,
            config,
            interesting_accounts: Vec::new(),
            exemptions: Vec::new(),
            state: Mutex::new(ReconcilerState::default()),
            changes_available: Notify::new(),
        }
    }

    /// Sets accounts to reconcile on every block.
    pub fn with_interesting_accounts(mut self, accounts: Vec<AccountCurrency>) -> Self {
        self.interesting_accounts = accounts;
        self
    }

    /// Sets the balance exemptions consulted when balances differ.
    pub fn with_balance_exemptions(mut self, exemptions: Vec<BalanceExemption>) -> Self {
        self.exemptions = exemptions;
        self
    }

    /// Queues the balance changes of `block` for active reconciliation.
    ///
    /// Interesting accounts missing from `changes` are queued with a zero
    /// difference.
    ///
    /// # Errors
    /// Fails if an account-currency cannot be keyed.
    pub async fn queue_changes(
        &self,
        block: &BlockIdentifier,
        mut changes: Vec<BalanceChange>,
    ) -> Result<(), ReconcilerError> {
        if !self.interesting_accounts.is_empty() {
            let present = changes
                .iter()
                .map(|change| change.account_currency().key())
                .collect::<Result<HashSet<_>, _>>()?;
            for interesting in &self.interesting_accounts {
                if present.contains(&interesting.key()?) {
                    continue;
                }
                changes.push(BalanceChange {
                    account: interesting.account.clone(),
                    currency: interesting.currency.clone(),
                    block: block.clone(),
                    difference: IntegerAmount::zero(),
                });
            }
        }

        let queued = changes.len();
        self.state.lock().await.change_queue.extend(changes);
        for _ in 0..queued {
            self.changes_available.notify_one();
        }
        debug!(block = %block, queued, "Queued balance changes");
        Ok(())
    }

    /// Puts an account-currency on the inactive schedule without waiting
    /// for a balance change.
    ///
    /// # Errors
    /// Fails if the account-currency cannot be keyed.
    pub async fn track_account(&self, entry: AccountCurrency) -> Result<(), ReconcilerError> {
        let key = entry.key()?;
        let mut state = self.state.lock().await;
        if state.seen_accounts.insert(key) {
            debug!(
                account = %entry.account.address,
                currency = %entry.currency.symbol,
                "Tracking account for inactive reconciliation"
            );
            state.inactive_queue.push_back(InactiveEntry {
                entry,
                last_check: None,
            });
        }
        Ok(())
    }

    /// Number of changes waiting for active reconciliation.
    pub async fn queue_len(&self) -> usize {
        self.state.lock().await.change_queue.len()
    }

    /// Number of entries on the inactive schedule.
    pub async fn inactive_queue_len(&self) -> usize {
        self.state.lock().await.inactive_queue.len()
    }

    pub async fn high_water_mark(&self) -> u64 {
        self.state.lock().await.high_water_mark
    }

    /// Compares the computed balance with `live_amount` at `live_block`.
    ///
    /// # Errors
    /// Fails if the helper fails or the subtraction overflows.
    pub async fn compare_balance(
        &self,
        account: &AccountIdentifier,
        currency: &Currency,
        live_amount: &IntegerAmount,
        live_block: &BlockIdentifier,
    ) -> Result<ComparisonOutcome, ReconcilerError> {
        let head = self
            .helper
            .current_block()
            .await
            .map_err(ReconcilerError::Helper)?;
        if live_block.index > head.index {
            return Ok(ComparisonOutcome::HeadBehindLive {
                head_index: head.index,
            });
        }

        let exists = self
            .helper
            .block_exists(live_block)
            .await
            .map_err(ReconcilerError::Helper)?;
        if !exists {
            return Ok(ComparisonOutcome::BlockGone);
        }

        let CachedBalance { amount, block } = self
            .helper
            .account_balance(account, currency, &head)
            .await
            .map_err(ReconcilerError::Helper)?;
        if block.index > live_block.index {
            return Ok(ComparisonOutcome::AccountUpdated);
        }

        Ok(ComparisonOutcome::Compared {
            difference: amount.checked_sub(live_amount)?,
            cached_balance: amount,
            head_index: head.index,
        })
    }

    /// Reconciles one account-currency against a live balance.
    ///
    /// Waits while the head lags the live block by less than
    /// `wait_to_check_diff`; a larger lag raises the high-water mark and
    /// skips the attempt.
    ///
    /// # Errors
    /// Fails on helper errors, or when the handler rejects a mismatch.
    pub async fn account_reconciliation(
        &self,
        kind: ReconciliationKind,
        account: &AccountIdentifier,
        currency: &Currency,
        live_amount: &IntegerAmount,
        live_block: &BlockIdentifier,
    ) -> Result<ReconciliationOutcome, ReconcilerError> {
        loop {
            let outcome = self
                .compare_balance(account, currency, live_amount, live_block)
                .await?;

            match outcome {
                ComparisonOutcome::HeadBehindLive { head_index } => {
                    let gap = live_block.index - head_index;
                    if gap < self.config.wait_to_check_diff {
                        debug!(
                            account = %account.address,
                            live = live_block.index,
                            head = head_index,
                            "Waiting for head to reach live block"
                        );
                        tokio::time::sleep(Duration::from_millis(
                            self.config.wait_to_check_diff_sleep_ms,
                        ))
                        .await;
                        continue;
                    }

                    let mut state = self.state.lock().await;
                    state.high_water_mark = state.high_water_mark.max(live_block.index);
                    warn!(
                        account = %account.address,
                        live = live_block.index,
                        head = head_index,
                        high_water_mark = state.high_water_mark,
                        "Head far behind live balance, skipping"
                    );
                    return Ok(ReconciliationOutcome::Skipped);
                }
                ComparisonOutcome::BlockGone | ComparisonOutcome::AccountUpdated => {
                    debug!(
                        account = %account.address,
                        currency = %currency.symbol,
                        ?outcome,
                        "Skipping reconciliation"
                    );
                    return Ok(ReconciliationOutcome::Skipped);
                }
                ComparisonOutcome::Compared {
                    difference,
                    cached_balance,
                    ..
                } => {
                    let entry = AccountCurrency::new(account.clone(), currency.clone());

                    if !difference.is_zero() {
                        let live_minus_computed = -difference;
                        let matched = find_exemptions(&self.exemptions, account, currency);
                        if let Some(exemption) =
                            match_balance_exemption(&matched, &live_minus_computed)
                        {
                            debug!(
                                ?kind,
                                account = %account.address,
                                currency = %currency.symbol,
                                difference = %live_minus_computed,
                                exemption = ?exemption.exemption_type,
                                "Balance difference exempt"
                            );
                            self.handler
                                .reconciliation_exempt(
                                    kind,
                                    account,
                                    currency,
                                    &cached_balance,
                                    live_amount,
                                    live_block,
                                    exemption,
                                )
                                .await
                                .map_err(ReconcilerError::Handler)?;
                            self.enqueue_inactive(kind, entry, live_block).await?;
                            return Ok(ReconciliationOutcome::Exempt);
                        }

                        warn!(
                            ?kind,
                            account = %account.address,
                            currency = %currency.symbol,
                            computed = %cached_balance,
                            live = %live_amount,
                            block = %live_block,
                            "Balance mismatch"
                        );
                        self.handler
                            .reconciliation_failed(
                                kind,
                                account,
                                currency,
                                &cached_balance,
                                live_amount,
                                live_block,
                            )
                            .await
                            .map_err(ReconcilerError::Handler)?;
                        self.enqueue_inactive(kind, entry, live_block).await?;
                        return Ok(ReconciliationOutcome::Mismatch);
                    }

                    self.enqueue_inactive(kind, entry, live_block).await?;
                    self.handler
                        .reconciliation_succeeded(kind, account, currency, live_amount, live_block)
                        .await
                        .map_err(ReconcilerError::Handler)?;
                    debug!(
                        ?kind,
                        account = %account.address,
                        currency = %currency.symbol,
                        block = %live_block,
                        "Reconciled"
                    );
                    return Ok(ReconciliationOutcome::Reconciled);
                }
            }
        }
    }

    /// Active checks enqueue an account only the first time it is seen;
    /// inactive checks always re-enqueue.
    async fn enqueue_inactive(
        &self,
        kind: ReconciliationKind,
        entry: AccountCurrency,
        last_check: &BlockIdentifier,
    ) -> Result<(), ReconcilerError> {
        let key = entry.key()?;
        let mut state = self.state.lock().await;
        let first_seen = state.seen_accounts.insert(key);
        if kind == ReconciliationKind::Inactive || first_seen {
            state.inactive_queue.push_back(InactiveEntry {
                entry,
                last_check: Some(last_check.clone()),
            });
        }
        Ok(())
    }

    /// Live balance in `currency`, at `block` or at the head.
    async fn best_live_balance(
        &self,
        account: &AccountIdentifier,
        currency: &Currency,
        block: Option<&PartialBlockIdentifier>,
    ) -> Result<(IntegerAmount, BlockIdentifier), ReconcilerError> {
        let response = self
            .fetcher
            .account_balance(&self.network, account, currency, block)
            .await?;
        let amount = response
            .currency_balance(currency)
            .ok_or_else(|| ReconcilerError::CurrencyNotFound {
                currency: currency.symbol.clone(),
                block: response.block_identifier.clone(),
            })?
            .integer_value()?;
        Ok((amount, response.block_identifier))
    }

    /// Drains the change queue until a fatal error.
    ///
    /// # Errors
    /// Returns the first fetch, helper or handler failure.
    pub async fn reconcile_active_accounts(&self) -> Result<(), ReconcilerError> {
        loop {
            let next = {
                let mut state = self.state.lock().await;
                let high_water_mark = state.high_water_mark;
                state
                    .change_queue
                    .pop_front()
                    .map(|change| (change, high_water_mark))
            };
            let Some((change, high_water_mark)) = next else {
                self.changes_available.notified().await;
                continue;
            };

            if change.block.index < high_water_mark {
                debug!(
                    account = %change.account.address,
                    block = %change.block,
                    high_water_mark,
                    "Dropping change below high-water mark"
                );
                continue;
            }

            let canonical = self
                .helper
                .block_exists(&change.block)
                .await
                .map_err(ReconcilerError::Helper)?;
            if !canonical {
                debug!(
                    account = %change.account.address,
                    block = %change.block,
                    "Dropping change from orphaned block"
                );
                continue;
            }

            let at = self
                .config
                .lookup_balance_by_block
                .then(|| PartialBlockIdentifier::from(&change.block));
            let (live_amount, live_block) = self
                .best_live_balance(&change.account, &change.currency, at.as_ref())
                .await?;

            self.account_reconciliation(
                ReconciliationKind::Active,
                &change.account,
                &change.currency,
                &live_amount,
                &live_block,
            )
            .await?;
        }
    }

    /// Revisits seen accounts every `inactive_frequency` blocks until a
    /// fatal error.
    ///
    /// # Errors
    /// Returns the first fetch or handler failure.
    pub async fn reconcile_inactive_accounts(&self) -> Result<(), ReconcilerError> {
        let idle = Duration::from_millis(self.config.inactive_sleep_ms);

        loop {
            if self.state.lock().await.inactive_queue.is_empty() {
                tokio::time::sleep(idle).await;
                continue;
            }

            // Nothing is processed before genesis, so a missing head is not fatal here.
            let head = match self.helper.current_block().await {
                Ok(head) => head,
                Err(e) => {
                    debug!(error = %e, "No processed head yet");
                    tokio::time::sleep(idle).await;
                    continue;
                }
            };

            let next = {
                let mut state = self.state.lock().await;
                let due = head.index >= state.high_water_mark
                    && state
                        .inactive_queue
                        .front()
                        .is_some_and(|next| next.is_due(&head, self.config.inactive_frequency));
                if due {
                    state.inactive_queue.pop_front()
                } else {
                    None
                }
            };
            let Some(InactiveEntry { entry, .. }) = next else {
                tokio::time::sleep(idle).await;
                continue;
            };

            let (live_amount, live_block) = self
                .best_live_balance(
                    &entry.account,
                    &entry.currency,
                    Some(&PartialBlockIdentifier::from(&head)),
                )
                .await?;

            let outcome = self
                .account_reconciliation(
                    ReconciliationKind::Inactive,
                    &entry.account,
                    &entry.currency,
                    &live_amount,
                    &live_block,
                )
                .await?;

            if outcome == ReconciliationOutcome::Skipped {
                self.state.lock().await.inactive_queue.push_back(InactiveEntry {
                    entry,
                    last_check: Some(head),
                });
            }
        }
    }

    /// Runs the configured active and inactive workers until one fails.
    ///
    /// Returns `Ok` only when no workers are configured.
    ///
    /// # Errors
    /// Returns the first worker failure; the remaining workers are aborted.
    pub async fn reconcile(self: Arc<Self>) -> Result<(), ReconcilerError> {
        let mut workers = JoinSet::new();
        for _ in 0..self.config.active_concurrency {
            let reconciler = Arc::clone(&self);
            workers.spawn(async move { reconciler.reconcile_active_accounts().await });
        }
        for _ in 0..self.config.inactive_concurrency {
            let reconciler = Arc::clone(&self);
            workers.spawn(async move { reconciler.reconcile_inactive_accounts().await });
        }

        info!(
            network = %self.network.network,
            active = self.config.active_concurrency,
            inactive = self.config.inactive_concurrency,
            "Reconciler started"
        );

        let result = match workers.join_next().await {
            Some(Ok(result)) => result,
            Some(Err(e)) => Err(ReconcilerError::Worker(e.to_string())),
            None => Ok(()),
        };
        workers.abort_all();

        if let Err(e) = &result {
            error!(error = %e, "Reconciler stopped");
        }
        result
    }
}
