//! Balance deltas and reconciliation units.

use crate::entities::account::AccountIdentifier;
use crate::error::DomainError;
use crate::value_objects::amount::IntegerAmount;
use crate::value_objects::currency::Currency;
use crate::value_objects::identifiers::BlockIdentifier;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Net change of one account's balance in one currency caused by one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// Account whose balance changed.
    pub account: AccountIdentifier,
    /// Currency of the change.
    pub currency: Currency,
    /// Block the change is attributed to.
    pub block: BlockIdentifier,
    /// Signed net change.
    pub difference: IntegerAmount,
}

impl BalanceChange {
    /// The account-currency pair this change affects.
    pub fn account_currency(&self) -> AccountCurrency {
        AccountCurrency::new(self.account.clone(), self.currency.clone())
    }
}

/// An (account, currency) pair: the unit of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCurrency {
    /// Reconciled account.
    pub account: AccountIdentifier,
    /// Reconciled currency.
    pub currency: Currency,
}

impl AccountCurrency {
    pub fn new(account: AccountIdentifier, currency: Currency) -> Self {
        Self { account, currency }
    }

    /// Canonical key: two pairs share a key iff they are deeply equal.
    ///
    /// Object keys are sorted at every depth, so the key does not depend on
    /// the order metadata was inserted in.
    ///
    /// # Errors
    /// Returns [`DomainError::Encoding`] if serialization fails.
    pub fn key(&self) -> Result<String, DomainError> {
        let encoding_error = |e: serde_json::Error| DomainError::Encoding {
            what: "account currency",
            reason: e.to_string(),
        };
        let value = serde_json::to_value(self).map_err(encoding_error)?;
        serde_json::to_string(&sorted(value)).map_err(encoding_error)
    }
}

fn sorted(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}
