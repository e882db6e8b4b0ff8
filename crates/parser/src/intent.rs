//! Comparison of intended operations with the operations a node reports.

use crate::balance_changes::Parser;
use crate::error::ParserError;
use blockcheck_domain::entities::Operation;

/// Checks that `observed` carries the same effect as `intent`.
///
/// Identifiers, status and metadata are ignored; type, account and amount
/// must be equal.
///
/// # Errors
/// Returns [`ParserError::OperationMismatch`] naming the first differing field.
pub fn expected_operation(intent: &Operation, observed: &Operation) -> Result<(), ParserError> {
    if intent.operation_type != observed.operation_type {
        return Err(ParserError::OperationMismatch("type"));
    }
    if intent.account != observed.account {
        return Err(ParserError::OperationMismatch("account"));
    }
    if intent.amount != observed.amount {
        return Err(ParserError::OperationMismatch("amount"));
    }
    Ok(())
}

impl Parser {
    /// Checks that every intended operation appears in `observed`.
    ///
    /// Each observed operation is paired with the first unpaired intent it
    /// matches. With `err_extra`, an observed operation matching no intent
    /// is an error. With `confirm_success`, paired observed operations must
    /// be successful according to the validator.
    ///
    /// # Errors
    /// Fails on extra, missing or unsuccessful operations, or if the
    /// validator fails.
    pub fn expected_operations(
        &self,
        intent: &[Operation],
        observed: &[Operation],
        err_extra: bool,
        confirm_success: bool,
    ) -> Result<(), ParserError> {
        let mut paired = vec![false; intent.len()];
        let mut unsuccessful = Vec::new();

        for obs in observed {
            let slot = intent
                .iter()
                .enumerate()
                .position(|(i, want)| !paired[i] && expected_operation(want, obs).is_ok());

            let Some(slot) = slot else {
                if err_extra {
                    return Err(ParserError::ExtraOperation(obs.index()));
                }
                continue;
            };

            if confirm_success
                && !self
                    .validator()
                    .operation_successful(obs)
                    .map_err(ParserError::Validator)?
            {
                unsuccessful.push(obs.index());
            }
            paired[slot] = true;
        }

        let missing: Vec<u64> = intent
            .iter()
            .zip(&paired)
            .filter(|(_, done)| !**done)
            .map(|(op, _)| op.index())
            .collect();
        if !missing.is_empty() {
            return Err(ParserError::MissingIntents(missing));
        }

        if !unsuccessful.is_empty() {
            return Err(ParserError::UnsuccessfulOperations(unsuccessful));
        }
        Ok(())
    }
}
