//! Declarative operation patterns.

use blockcheck_domain::Metadata;
use blockcheck_domain::entities::{AccountIdentifier, CoinAction, Operation};
use blockcheck_domain::value_objects::{Amount, Currency, IntegerAmount};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Required sign of a matched amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountSign {
    /// Any value.
    #[default]
    Any,
    /// Strictly negative.
    Negative,
    /// Strictly positive.
    Positive,
    /// Zero or negative.
    NegativeOrZero,
    /// Zero or positive.
    PositiveOrZero,
}

impl AmountSign {
    /// Whether `value` has this sign.
    pub fn matches(&self, value: &IntegerAmount) -> bool {
        match self {
            Self::Any => true,
            Self::Negative => value.is_negative(),
            Self::Positive => value.is_positive(),
            Self::NegativeOrZero => !value.is_positive(),
            Self::PositiveOrZero => !value.is_negative(),
        }
    }
}

/// Required JSON kind of a metadata value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataValueKind {
    #[default]
    Any,
    String,
    Number,
    Bool,
    Object,
    Array,
}

impl MetadataValueKind {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Bool => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// A metadata key that must be present with a value of the given kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDescription {
    pub key: String,
    #[serde(default)]
    pub value_kind: MetadataValueKind,
}

impl MetadataDescription {
    pub fn new(key: impl Into<String>, value_kind: MetadataValueKind) -> Self {
        Self {
            key: key.into(),
            value_kind,
        }
    }
}

fn metadata_accepts(required: &[MetadataDescription], metadata: Option<&Metadata>) -> bool {
    required.iter().all(|req| {
        metadata
            .and_then(|m| m.get(&req.key))
            .is_some_and(|value| req.value_kind.matches(value))
    })
}

/// Constraints on an operation's account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountDescription {
    /// Whether the account must be present (or absent).
    pub exists: bool,
    /// Whether the sub-account must be present (or absent).
    pub sub_account_exists: bool,
    /// Required sub-account address; empty accepts any.
    pub sub_account_address: String,
    /// Metadata keys the sub-account must carry.
    pub sub_account_metadata_keys: Vec<MetadataDescription>,
}

impl AccountDescription {
    /// Requires an account to be present.
    pub fn present() -> Self {
        Self {
            exists: true,
            ..Self::default()
        }
    }

    pub fn accepts(&self, account: Option<&AccountIdentifier>) -> bool {
        let Some(account) = account else {
            return !self.exists;
        };
        if !self.exists {
            return false;
        }

        let Some(sub_account) = &account.sub_account else {
            return !self.sub_account_exists;
        };
        if !self.sub_account_exists {
            return false;
        }

        if !self.sub_account_address.is_empty() && self.sub_account_address != sub_account.address {
            return false;
        }

        metadata_accepts(
            &self.sub_account_metadata_keys,
            sub_account.metadata.as_ref(),
        )
    }
}

/// Constraints on an operation's amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmountDescription {
    /// Whether the amount must be present (or absent).
    pub exists: bool,
    pub sign: AmountSign,
    /// Required currency, if any.
    pub currency: Option<Currency>,
}

impl AmountDescription {
    /// Requires an amount of the given sign.
    pub fn with_sign(sign: AmountSign) -> Self {
        Self {
            exists: true,
            sign,
            currency: None,
        }
    }

    pub fn accepts(&self, amount: Option<&Amount>) -> bool {
        let Some(amount) = amount else {
            return !self.exists;
        };
        if !self.exists {
            return false;
        }

        let Ok(value) = amount.integer_value() else {
            return false;
        };
        if !self.sign.matches(&value) {
            return false;
        }

        self.currency
            .as_ref()
            .is_none_or(|currency| *currency == amount.currency)
    }
}

/// Pattern for one operation slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationDescription {
    /// Required operation type; empty accepts any.
    #[serde(rename = "type")]
    pub operation_type: String,
    pub account: Option<AccountDescription>,
    pub amount: Option<AmountDescription>,
    /// Metadata keys the operation must carry.
    pub metadata: Vec<MetadataDescription>,
    /// Whether the slot may collect several operations.
    pub allow_repeats: bool,
    /// Whether the slot may stay empty.
    pub optional: bool,
    /// Required coin action, if any.
    pub coin_action: Option<CoinAction>,
}

impl OperationDescription {
    /// Whether every sub-pattern accepts the operation.
    pub fn accepts(&self, operation: &Operation) -> bool {
        if !self.operation_type.is_empty() && self.operation_type != operation.operation_type {
            return false;
        }

        if let Some(account) = &self.account
            && !account.accepts(operation.account.as_ref())
        {
            return false;
        }

        if let Some(amount) = &self.amount
            && !amount.accepts(operation.amount.as_ref())
        {
            return false;
        }

        if !metadata_accepts(&self.metadata, operation.metadata.as_ref()) {
            return false;
        }

        match self.coin_action {
            Some(action) => operation
                .coin_change
                .as_ref()
                .is_some_and(|change| change.coin_action == action),
            None => true,
        }
    }
}

/// A full pattern over a list of operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Descriptions {
    pub operation_descriptions: Vec<OperationDescription>,
    /// Groups of slots whose operations must all share one amount.
    pub equal_amounts: Vec<Vec<usize>>,
    /// Pairs of slots whose amounts must be opposite and non-zero.
    pub opposite_amounts: Vec<Vec<usize>>,
    /// Pairs of slots whose amounts must be opposite or both zero.
    pub opposite_zero_amounts: Vec<Vec<usize>>,
    /// Groups of slots whose operations must share one account address.
    pub equal_addresses: Vec<Vec<usize>>,
    /// Whether an operation no slot accepts is an error.
    pub err_unmatched: bool,
}
