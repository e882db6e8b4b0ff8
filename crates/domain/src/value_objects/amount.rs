//! Exact signed integer amounts.
//!
//! Node APIs report balances and operation amounts as base-10 strings in the
//! currency's smallest unit. They are parsed into [`IntegerAmount`] so that
//! sums and differences are computed without loss.

use crate::error::DomainError;
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

/// Signed integer with a 256-bit magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntegerAmount {
    negative: bool,
    magnitude: U256,
}

impl IntegerAmount {
    /// Creates an amount from a sign and magnitude. Zero is always positive.
    pub fn new(negative: bool, magnitude: U256) -> Self {
        Self {
            negative: negative && !magnitude.is_zero(),
            magnitude,
        }
    }

    /// Returns zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Absolute value.
    pub fn magnitude(&self) -> U256 {
        self.magnitude
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_positive(&self) -> bool {
        !self.negative && !self.magnitude.is_zero()
    }

    /// Adds two amounts.
    ///
    /// # Errors
    /// Returns [`DomainError::AmountOverflow`] if the magnitude exceeds 256 bits.
    pub fn checked_add(&self, other: &Self) -> Result<Self, DomainError> {
        if self.negative == other.negative {
            let magnitude = self.magnitude.checked_add(other.magnitude).ok_or_else(|| {
                DomainError::AmountOverflow {
                    lhs: self.to_string(),
                    op: '+',
                    rhs: other.to_string(),
                }
            })?;
            return Ok(Self::new(self.negative, magnitude));
        }

        // Signs differ: the larger magnitude decides the sign.
        match self.magnitude.cmp(&other.magnitude) {
            Ordering::Less => Ok(Self::new(other.negative, other.magnitude - self.magnitude)),
            _ => Ok(Self::new(self.negative, self.magnitude - other.magnitude)),
        }
    }

    /// Subtracts `other` from `self`.
    ///
    /// # Errors
    /// Returns [`DomainError::AmountOverflow`] if the magnitude exceeds 256 bits.
    pub fn checked_sub(&self, other: &Self) -> Result<Self, DomainError> {
        self.checked_add(&-*other).map_err(|_| DomainError::AmountOverflow {
            lhs: self.to_string(),
            op: '-',
            rhs: other.to_string(),
        })
    }
}

impl Neg for IntegerAmount {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(!self.negative, self.magnitude)
    }
}

impl Ord for IntegerAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.magnitude.cmp(&other.magnitude),
            (true, true) => other.magnitude.cmp(&self.magnitude),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
        }
    }
}

impl PartialOrd for IntegerAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for IntegerAmount {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidAmount(s.to_string()));
        }

        let magnitude =
            U256::from_dec_str(digits).map_err(|_| DomainError::InvalidAmount(s.to_string()))?;
        Ok(Self::new(negative, magnitude))
    }
}

impl fmt::Display for IntegerAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}

impl From<u64> for IntegerAmount {
    fn from(v: u64) -> Self {
        Self::new(false, U256::from(v))
    }
}

impl From<i64> for IntegerAmount {
    fn from(v: i64) -> Self {
        Self::new(v < 0, U256::from(v.unsigned_abs()))
    }
}

impl Serialize for IntegerAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for IntegerAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
