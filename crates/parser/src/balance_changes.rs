//! Net balance changes caused by a block.

use crate::error::ParserError;
use crate::validator::OperationValidator;
use blockcheck_domain::entities::{Block, Operation};
use blockcheck_domain::value_objects::{AccountCurrency, BalanceChange};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Predicate marking operations whose balance effect must not be tracked.
pub trait ExemptOperation: Send + Sync {
    fn is_exempt(&self, operation: &Operation) -> bool;
}

impl<F> ExemptOperation for F
where
    F: Fn(&Operation) -> bool + Send + Sync,
{
    fn is_exempt(&self, operation: &Operation) -> bool {
        self(operation)
    }
}

/// Derives balance changes from blocks and compares operation lists.
#[derive(Clone)]
pub struct Parser {
    validator: Arc<dyn OperationValidator>,
    exemption: Option<Arc<dyn ExemptOperation>>,
}

impl Parser {
    /// Creates a parser using `validator` to judge operation success.
    pub fn new(validator: Arc<dyn OperationValidator>) -> Self {
        Self {
            validator,
            exemption: None,
        }
    }

    /// Skips operations accepted by `exemption`.
    #[must_use]
    pub fn with_exemption(mut self, exemption: Arc<dyn ExemptOperation>) -> Self {
        self.exemption = Some(exemption);
        self
    }

    pub(crate) fn validator(&self) -> &dyn OperationValidator {
        self.validator.as_ref()
    }

    fn skip_operation(&self, operation: &Operation) -> Result<bool, ParserError> {
        let successful = self
            .validator
            .operation_successful(operation)
            .map_err(ParserError::Validator)?;

        if !successful || operation.account.is_none() || operation.amount.is_none() {
            return Ok(true);
        }

        Ok(self
            .exemption
            .as_ref()
            .is_some_and(|exemption| exemption.is_exempt(operation)))
    }

    /// Computes one balance change per (account, currency) touched by `block`.
    ///
    /// With `block_removed`, every amount is negated and changes are
    /// attributed to the parent block, undoing the block's effect.
    ///
    /// # Errors
    /// Fails if the validator fails, an amount is malformed, or a sum
    /// overflows.
    pub fn balance_changes(
        &self,
        block: &Block,
        block_removed: bool,
    ) -> Result<Vec<BalanceChange>, ParserError> {
        let attributed = if block_removed {
            &block.parent_block_identifier
        } else {
            &block.block_identifier
        };

        let mut changes: BTreeMap<String, BalanceChange> = BTreeMap::new();

        for transaction in &block.transactions {
            for operation in &transaction.operations {
                if self.skip_operation(operation)? {
                    continue;
                }
                let (Some(account), Some(amount)) = (&operation.account, &operation.amount) else {
                    continue;
                };

                let mut value = amount.integer_value()?;
                if block_removed {
                    value = -value;
                }

                let pair = AccountCurrency::new(account.clone(), amount.currency.clone());
                let key = pair.key()?;
                match changes.get_mut(&key) {
                    Some(change) => change.difference = change.difference.checked_add(&value)?,
                    None => {
                        changes.insert(
                            key,
                            BalanceChange {
                                account: pair.account,
                                currency: pair.currency,
                                block: attributed.clone(),
                                difference: value,
                            },
                        );
                    }
                }
            }
        }

        debug!(
            block = %block.block_identifier,
            block_removed,
            changes = changes.len(),
            "Computed balance changes"
        );

        Ok(changes.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::StatusTable;
    use blockcheck_domain::entities::{AccountIdentifier, Transaction};
    use blockcheck_domain::value_objects::{Amount, BlockIdentifier, Currency};

    fn btc() -> Currency {
        Currency::new("BTC", 8)
    }

    fn credit(index: u64, address: &str, value: &str, status: &str) -> Operation {
        Operation::new(index, "TRANSFER")
            .with_status(status)
            .with_account(AccountIdentifier::new(address))
            .with_amount(Amount::new(value, btc()))
    }

    fn parser() -> Parser {
        Parser::new(Arc::new(StatusTable::new([
            ("SUCCESS", true),
            ("FAILURE", false),
        ])))
    }

    fn block(operations: Vec<Operation>) -> Block {
        Block::new(
            BlockIdentifier::new(1, "1"),
            BlockIdentifier::new(0, "0"),
            vec![Transaction::new("tx1", operations)],
        )
    }

    #[test]
    fn test_single_credit() {
        let changes = parser()
            .balance_changes(&block(vec![credit(0, "acct1", "100", "SUCCESS")]), false)
            .unwrap();

        assert_eq!(
            changes,
            vec![BalanceChange {
                account: AccountIdentifier::new("acct1"),
                currency: btc(),
                block: BlockIdentifier::new(1, "1"),
                difference: "100".parse().unwrap(),
            }]
        );
    }

    #[test]
    fn test_accumulates_and_skips() {
        let ops = vec![
            credit(0, "acct1", "100", "SUCCESS"),
            credit(1, "acct1", "-30", "SUCCESS"),
            credit(2, "acct1", "1000", "FAILURE"),
            Operation::new(3, "FEE").with_status("SUCCESS"),
            credit(4, "acct2", "7", "SUCCESS"),
        ];
        let changes = parser().balance_changes(&block(ops), false).unwrap();

        assert_eq!(changes.len(), 2);
        let acct1 = changes
            .iter()
            .find(|c| c.account.address == "acct1")
            .unwrap();
        assert_eq!(acct1.difference.to_string(), "70");
    }

    #[test]
    fn test_removed_block_negates_and_uses_parent() {
        let b = block(vec![
            credit(0, "acct1", "100", "SUCCESS"),
            credit(1, "acct2", "-100", "SUCCESS"),
        ]);
        let added = parser().balance_changes(&b, false).unwrap();
        let removed = parser().balance_changes(&b, true).unwrap();

        assert_eq!(added.len(), removed.len());
        for (a, r) in added.iter().zip(&removed) {
            assert_eq!(a.account, r.account);
            assert_eq!(a.currency, r.currency);
            assert_eq!(r.difference, -a.difference);
            assert_eq!(a.block, b.block_identifier);
            assert_eq!(r.block, b.parent_block_identifier);
        }
    }

    #[test]
    fn test_exemption_predicate() {
        let exempt = |op: &Operation| op.account.as_ref().is_some_and(|a| a.address == "acct2");
        let parser = parser().with_exemption(Arc::new(exempt));

        let changes = parser
            .balance_changes(
                &block(vec![
                    credit(0, "acct1", "1", "SUCCESS"),
                    credit(1, "acct2", "1", "SUCCESS"),
                ]),
                false,
            )
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].account.address, "acct1");
    }

    #[test]
    fn test_validator_error_propagates() {
        let err = parser()
            .balance_changes(&block(vec![credit(0, "acct1", "1", "PENDING")]), false)
            .unwrap_err();
        assert!(matches!(err, ParserError::Validator(_)));
    }

    #[test]
    fn test_malformed_amount() {
        let err = parser()
            .balance_changes(&block(vec![credit(0, "acct1", "1.0", "SUCCESS")]), false)
            .unwrap_err();
        assert!(matches!(err, ParserError::Domain(_)));
    }
}
