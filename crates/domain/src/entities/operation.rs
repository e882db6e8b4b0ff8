//! Operations: the atomic effects of a transaction.

use crate::Metadata;
use crate::entities::account::AccountIdentifier;
use crate::value_objects::currency::Amount;
use crate::value_objects::identifiers::{CoinIdentifier, OperationIdentifier};
use serde::{Deserialize, Serialize};

/// Lifecycle change of a coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinAction {
    /// Coin was created by the operation.
    CoinCreated,
    /// Coin was spent by the operation.
    CoinSpent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinChange {
    pub coin_identifier: CoinIdentifier,
    pub coin_action: CoinAction,
}

/// One effect of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub operation_identifier: OperationIdentifier,
    /// Earlier operations in the same transaction this one is linked to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_operations: Option<Vec<OperationIdentifier>>,
    #[serde(rename = "type")]
    pub operation_type: String,
    /// Absent for operations that have not been executed yet (intents).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountIdentifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin_change: Option<CoinChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Operation {
    /// Creates a bare operation of the given type at `index`.
    pub fn new(index: u64, operation_type: impl Into<String>) -> Self {
        Self {
            operation_identifier: OperationIdentifier::new(index),
            related_operations: None,
            operation_type: operation_type.into(),
            status: None,
            account: None,
            amount: None,
            coin_change: None,
            metadata: None,
        }
    }

    pub fn index(&self) -> u64 {
        self.operation_identifier.index
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_account(mut self, account: AccountIdentifier) -> Self {
        self.account = Some(account);
        self
    }

    #[must_use]
    pub fn with_amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Links this operation to earlier operations by index.
    #[must_use]
    pub fn with_related(mut self, indices: &[u64]) -> Self {
        self.related_operations = Some(
            indices
                .iter()
                .map(|&index| OperationIdentifier::new(index))
                .collect(),
        );
        self
    }

    #[must_use]
    pub fn with_coin_change(mut self, coin_change: CoinChange) -> Self {
        self.coin_change = Some(coin_change);
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
