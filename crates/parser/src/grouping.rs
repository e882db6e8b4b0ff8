//! Reconstruction of multi-leg actions from related operations.

use blockcheck_domain::entities::{Operation, Transaction};
use blockcheck_domain::value_objects::Currency;
use std::collections::BTreeMap;

/// Operations of a transaction that are transitively related.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationGroup {
    /// Type shared by every operation, or empty if types differ.
    pub operation_type: String,
    /// Member operations sorted by index.
    pub operations: Vec<Operation>,
    /// Distinct currencies of member amounts.
    pub currencies: Vec<Currency>,
    /// Whether any member has no amount.
    pub nil_amount_present: bool,
}

impl OperationGroup {
    fn singleton(operation: &Operation) -> Self {
        let mut group = Self {
            operation_type: operation.operation_type.clone(),
            operations: Vec::new(),
            currencies: Vec::new(),
            nil_amount_present: false,
        };
        group.push(operation.clone());
        group
    }

    fn push(&mut self, operation: Operation) {
        if self.operation_type != operation.operation_type {
            self.operation_type.clear();
        }

        match &operation.amount {
            Some(amount) => self.add_currency(&amount.currency),
            None => self.nil_amount_present = true,
        }

        self.operations.push(operation);
    }

    fn absorb(&mut self, other: OperationGroup) {
        if self.operation_type != other.operation_type {
            self.operation_type.clear();
        }

        for currency in &other.currencies {
            self.add_currency(currency);
        }

        self.nil_amount_present |= other.nil_amount_present;
        self.operations.extend(other.operations);
    }

    fn add_currency(&mut self, currency: &Currency) {
        if !self.currencies.contains(currency) {
            self.currencies.push(currency.clone());
        }
    }
}

/// Groups a transaction's operations by their `related_operations` links.
///
/// Each group is identified by the position of the operation that opened
/// it. An operation referencing several groups merges them into the
/// earliest one. Groups are returned in ascending order of that position,
/// i.e. ordered by their lowest member index. References to the operation
/// itself or to later operations are ignored.
pub fn group_operations(transaction: &Transaction) -> Vec<OperationGroup> {
    let mut groups: BTreeMap<usize, OperationGroup> = BTreeMap::new();
    let mut assignments: Vec<usize> = Vec::with_capacity(transaction.operations.len());

    for (position, operation) in transaction.operations.iter().enumerate() {
        let mut targets: Vec<usize> = operation
            .related_operations
            .iter()
            .flatten()
            .filter_map(|related| usize::try_from(related.index).ok())
            .filter(|&related| related < position)
            .map(|related| assignments[related])
            .collect();
        targets.sort_unstable();
        targets.dedup();

        let Some((&survivor, others)) = targets.split_first() else {
            groups.insert(position, OperationGroup::singleton(operation));
            assignments.push(position);
            continue;
        };

        let absorbed: Vec<OperationGroup> = others
            .iter()
            .filter_map(|other| groups.remove(other))
            .collect();
        for assignment in assignments.iter_mut() {
            if others.contains(assignment) {
                *assignment = survivor;
            }
        }

        if let Some(group) = groups.get_mut(&survivor) {
            for other in absorbed {
                group.absorb(other);
            }
            group.push(operation.clone());
        }
        assignments.push(survivor);
    }

    groups
        .into_values()
        .map(|mut group| {
            group.operations.sort_by_key(Operation::index);
            group
        })
        .collect()
}
