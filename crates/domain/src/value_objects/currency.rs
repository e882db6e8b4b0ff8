use crate::Metadata;
use crate::error::DomainError;
use crate::value_objects::amount::IntegerAmount;
use serde::{Deserialize, Serialize};

/// A currency, compared by deep equality of all fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// Ticker, e.g. `BTC`.
    pub symbol: String,
    /// Number of decimal places of the smallest unit.
    pub decimals: u32,
    /// Chain-specific details, part of the currency's identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Currency {
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals,
            metadata: None,
        }
    }
}

/// An amount in a currency's smallest unit, as reported on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Signed base-10 integer string.
    pub value: String,
    pub currency: Currency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Amount {
    pub fn new(value: impl Into<String>, currency: Currency) -> Self {
        Self {
            value: value.into(),
            currency,
            metadata: None,
        }
    }

    /// Parses the value into an exact integer.
    ///
    /// # Errors
    /// Returns [`DomainError::InvalidAmount`] if the value is malformed.
    pub fn integer_value(&self) -> Result<IntegerAmount, DomainError> {
        self.value.parse()
    }
}
