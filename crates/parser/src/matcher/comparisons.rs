//! Cross-slot invariants declared on [`Descriptions`].

use super::{Descriptions, Match};
use crate::error::ParserError;
use blockcheck_domain::entities::Operation;
use blockcheck_domain::value_objects::IntegerAmount;

const EQUAL_AMOUNTS: &str = "equal amounts";
const EQUAL_ADDRESSES: &str = "equal addresses";
const OPPOSITE_AMOUNTS: &str = "opposite amounts";

/// Runs every declared comparison. Unfilled optional slots contribute no
/// operations.
pub(super) fn check(
    descriptions: &Descriptions,
    matches: &[Option<Match>],
) -> Result<(), ParserError> {
    for slots in &descriptions.equal_amounts {
        let operations = collect(EQUAL_AMOUNTS, slots, matches)?;
        equal_amounts(&operations)?;
    }

    for slots in &descriptions.equal_addresses {
        let operations = collect(EQUAL_ADDRESSES, slots, matches)?;
        equal_addresses(&operations)?;
    }

    for pair in &descriptions.opposite_amounts {
        opposite_pair(pair, matches, false)?;
    }

    for pair in &descriptions.opposite_zero_amounts {
        opposite_pair(pair, matches, true)?;
    }

    Ok(())
}

fn collect<'a>(
    check: &'static str,
    slots: &[usize],
    matches: &'a [Option<Match>],
) -> Result<Vec<&'a Operation>, ParserError> {
    let mut operations = Vec::new();
    for &index in slots {
        let slot = matches.get(index).ok_or(ParserError::DescriptionOutOfRange {
            check,
            index,
            len: matches.len(),
        })?;
        if let Some(m) = slot {
            operations.extend(m.operations.iter());
        }
    }
    Ok(operations)
}

fn amount_of(check: &'static str, operation: &Operation) -> Result<IntegerAmount, ParserError> {
    let amount = operation.amount.as_ref().ok_or(ParserError::AmountMissing {
        check,
        index: operation.index(),
    })?;
    Ok(amount.integer_value()?)
}

/// Returns the amount shared by every operation.
fn equal_amounts(operations: &[&Operation]) -> Result<IntegerAmount, ParserError> {
    let Some((first, rest)) = operations.split_first() else {
        return Err(ParserError::TooFewOperations {
            check: EQUAL_AMOUNTS,
            required: 1,
            found: 0,
        });
    };

    let expected = amount_of(EQUAL_AMOUNTS, first)?;
    for operation in rest {
        let found = amount_of(EQUAL_AMOUNTS, operation)?;
        if found != expected {
            return Err(ParserError::AmountsNotEqual {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }
    Ok(expected)
}

fn equal_addresses(operations: &[&Operation]) -> Result<(), ParserError> {
    if operations.len() < 2 {
        return Err(ParserError::TooFewOperations {
            check: EQUAL_ADDRESSES,
            required: 2,
            found: operations.len(),
        });
    }

    let mut expected: Option<&str> = None;
    for operation in operations {
        let account = operation.account.as_ref().ok_or(ParserError::AccountMissing {
            check: EQUAL_ADDRESSES,
            index: operation.index(),
        })?;
        match expected {
            None => expected = Some(account.address.as_str()),
            Some(address) if address != account.address => {
                return Err(ParserError::AddressesNotEqual {
                    expected: address.to_string(),
                    found: account.address.clone(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn opposite_pair(
    pair: &[usize],
    matches: &[Option<Match>],
    allow_zero: bool,
) -> Result<(), ParserError> {
    let [a, b] = pair else {
        return Err(ParserError::OppositeAmountsArity(pair.len()));
    };

    let first = equal_amounts(&collect(OPPOSITE_AMOUNTS, &[*a], matches)?)?;
    let second = equal_amounts(&collect(OPPOSITE_AMOUNTS, &[*b], matches)?)?;

    if allow_zero && first.is_zero() && second.is_zero() {
        return Ok(());
    }

    let opposite_signs = first.is_negative() != second.is_negative()
        && !first.is_zero()
        && !second.is_zero();
    if !opposite_signs || first.magnitude() != second.magnitude() {
        return Err(ParserError::AmountsNotOpposite {
            first: first.to_string(),
            second: second.to_string(),
        });
    }
    Ok(())
}
