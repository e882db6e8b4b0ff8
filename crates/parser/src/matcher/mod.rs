//! Greedy pattern matching of operations against descriptions.
//!
//! Each operation is assigned to the first description, in declaration
//! order, that accepts it. There is no backtracking: an operation accepted
//! by an early description is never reconsidered for a later one.

mod comparisons;
mod descriptions;

pub use descriptions::*;

use crate::error::ParserError;
use blockcheck_domain::entities::Operation;
use blockcheck_domain::value_objects::IntegerAmount;
use tracing::trace;

/// Operations collected by one description, with their parsed amounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Match {
    /// Matched operations, in the order they were assigned.
    pub operations: Vec<Operation>,
    /// Parallel to `operations`; `None` where the operation has no amount.
    pub amounts: Vec<Option<IntegerAmount>>,
}

impl Match {
    fn record(&mut self, operation: &Operation) -> Result<(), ParserError> {
        let amount = operation
            .amount
            .as_ref()
            .map(|amount| amount.integer_value())
            .transpose()?;
        self.operations.push(operation.clone());
        self.amounts.push(amount);
        Ok(())
    }

    /// The first matched operation and its amount.
    pub fn first(&self) -> Option<(&Operation, Option<&IntegerAmount>)> {
        let operation = self.operations.first()?;
        let amount = self.amounts.first().and_then(Option::as_ref);
        Some((operation, amount))
    }
}

/// Matches `operations` against `descriptions`.
///
/// Returns one entry per operation description, `None` for optional
/// descriptions that matched nothing.
///
/// # Errors
/// Fails if an operation is unmatched while `err_unmatched` is set, if a
/// required description is unmatched, or if any declared comparison is
/// violated. The error names the first violated constraint.
pub fn match_operations(
    descriptions: &Descriptions,
    operations: &[Operation],
) -> Result<Vec<Option<Match>>, ParserError> {
    let slots = &descriptions.operation_descriptions;
    let mut matches: Vec<Option<Match>> = vec![None; slots.len()];

    for operation in operations {
        let accepted = slots.iter().enumerate().position(|(i, description)| {
            (matches[i].is_none() || description.allow_repeats) && description.accepts(operation)
        });

        match accepted {
            Some(slot) => {
                trace!(operation = operation.index(), slot, "Operation matched");
                matches[slot]
                    .get_or_insert_with(Match::default)
                    .record(operation)?;
            }
            None if descriptions.err_unmatched => {
                return Err(ParserError::UnmatchedOperation(operation.index()));
            }
            None => {}
        }
    }

    if let Some(missing) = slots
        .iter()
        .zip(&matches)
        .position(|(description, m)| m.is_none() && !description.optional)
    {
        return Err(ParserError::UnmatchedDescription(missing));
    }

    comparisons::check(descriptions, &matches)?;
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockcheck_domain::entities::AccountIdentifier;
    use blockcheck_domain::value_objects::{Amount, Currency};

    fn transfer(index: u64, address: &str, value: &str) -> Operation {
        Operation::new(index, "TRANSFER")
            .with_account(AccountIdentifier::new(address))
            .with_amount(Amount::new(value, Currency::new("BTC", 8)))
    }

    fn slot(sign: AmountSign) -> OperationDescription {
        OperationDescription {
            account: Some(AccountDescription::present()),
            amount: Some(AmountDescription::with_sign(sign)),
            ..OperationDescription::default()
        }
    }

    fn sender_recipient() -> Descriptions {
        Descriptions {
            operation_descriptions: vec![slot(AmountSign::Negative), slot(AmountSign::Positive)],
            opposite_amounts: vec![vec![0, 1]],
            ..Descriptions::default()
        }
    }

    #[test]
    fn test_sender_recipient_with_unconstrained_operation() {
        let operations = vec![
            transfer(0, "addr2", "100"),
            Operation::new(1, "TRANSFER"),
            transfer(2, "addr1", "-100"),
        ];

        let matches = match_operations(&sender_recipient(), &operations).unwrap();
        assert_eq!(matches.len(), 2);

        let sender = matches[0].as_ref().unwrap();
        assert_eq!(sender.operations, vec![operations[2].clone()]);
        assert_eq!(sender.amounts, vec![Some("-100".parse().unwrap())]);

        let recipient = matches[1].as_ref().unwrap();
        assert_eq!(recipient.operations, vec![operations[0].clone()]);
        assert_eq!(recipient.amounts, vec![Some("100".parse().unwrap())]);

        let (first, amount) = recipient.first().unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!(amount.map(ToString::to_string).as_deref(), Some("100"));
    }

    #[test]
    fn test_err_unmatched_names_operation() {
        let descriptions = Descriptions {
            err_unmatched: true,
            ..sender_recipient()
        };
        let operations = vec![
            transfer(0, "addr2", "100"),
            Operation::new(1, "TRANSFER"),
            transfer(2, "addr1", "-100"),
        ];

        let err = match_operations(&descriptions, &operations).unwrap_err();
        assert!(matches!(err, ParserError::UnmatchedOperation(1)));
    }

    #[test]
    fn test_missing_required_description() {
        let operations = vec![transfer(0, "addr1", "-100")];
        let err = match_operations(&sender_recipient(), &operations).unwrap_err();
        assert!(matches!(err, ParserError::UnmatchedDescription(1)));
    }

    #[test]
    fn test_optional_description_may_stay_empty() {
        let mut descriptions = sender_recipient();
        descriptions.opposite_amounts.clear();
        descriptions.operation_descriptions[1].optional = true;

        let matches = match_operations(&descriptions, &[transfer(0, "addr1", "-5")]).unwrap();
        assert!(matches[0].is_some());
        assert!(matches[1].is_none());
    }

    #[test]
    fn test_first_fit_without_backtracking() {
        // Slot 0 accepts anything, so slot 1 never fills even though it could.
        let descriptions = Descriptions {
            operation_descriptions: vec![
                OperationDescription::default(),
                slot(AmountSign::Positive),
            ],
            ..Descriptions::default()
        };
        let err = match_operations(&descriptions, &[transfer(0, "addr1", "5")]).unwrap_err();
        assert!(matches!(err, ParserError::UnmatchedDescription(1)));
    }

    #[test]
    fn test_allow_repeats_collects_operations() {
        let descriptions = Descriptions {
            operation_descriptions: vec![OperationDescription {
                allow_repeats: true,
                ..slot(AmountSign::Positive)
            }],
            equal_amounts: vec![vec![0]],
            ..Descriptions::default()
        };
        let operations = vec![transfer(0, "a", "7"), transfer(1, "b", "7")];

        let matches = match_operations(&descriptions, &operations).unwrap();
        assert_eq!(matches[0].as_ref().unwrap().operations.len(), 2);
    }

    #[test]
    fn test_opposite_amounts_violation() {
        let operations = vec![transfer(0, "addr1", "-100"), transfer(1, "addr2", "99")];
        let err = match_operations(&sender_recipient(), &operations).unwrap_err();
        assert!(matches!(err, ParserError::AmountsNotOpposite { .. }));
    }
}
