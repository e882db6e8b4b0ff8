//! Operation status validation capability.

use anyhow::anyhow;
use blockcheck_domain::entities::Operation;
use std::collections::HashMap;

/// Decides whether an operation's status denotes successful execution.
///
/// Implemented by the wire-format validator of the embedding application.
pub trait OperationValidator: Send + Sync {
    /// Returns whether the operation succeeded.
    ///
    /// # Errors
    /// Returns an error if the status is missing or unknown.
    fn operation_successful(&self, operation: &Operation) -> anyhow::Result<bool>;
}

/// Validator backed by a table of the statuses a node advertises.
#[derive(Debug, Clone, Default)]
pub struct StatusTable {
    statuses: HashMap<String, bool>,
}

impl StatusTable {
    /// Creates a table from `(status, successful)` pairs.
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        Self {
            statuses: statuses
                .into_iter()
                .map(|(status, ok)| (status.into(), ok))
                .collect(),
        }
    }
}

impl OperationValidator for StatusTable {
    fn operation_successful(&self, operation: &Operation) -> anyhow::Result<bool> {
        let status = operation
            .status
            .as_deref()
            .ok_or_else(|| anyhow!("operation {} has no status", operation.index()))?;

        self.statuses.get(status).copied().ok_or_else(|| {
            anyhow!(
                "operation {} has unknown status {status:?}",
                operation.index()
            )
        })
    }
}
