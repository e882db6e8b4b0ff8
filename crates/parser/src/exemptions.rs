//! Balance exemptions: accounts whose balance may change without an
//! operation explaining it (e.g. staking rewards or interest).

use blockcheck_domain::entities::AccountIdentifier;
use blockcheck_domain::value_objects::{Currency, IntegerAmount};
use serde::{Deserialize, Serialize};

/// How a live balance may deviate from the computed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExemptionType {
    /// Any deviation.
    Dynamic,
    /// Live balance may exceed the computed balance.
    GreaterOrEqual,
    /// Live balance may fall below the computed balance.
    LessOrEqual,
}

/// An exemption applying to a sub-account address or a currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceExemption {
    /// Sub-account address the exemption covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_account_address: Option<String>,
    /// Currency the exemption covers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    pub exemption_type: ExemptionType,
}

impl BalanceExemption {
    /// Whether the exemption covers this account and currency.
    pub fn applies_to(&self, account: &AccountIdentifier, currency: &Currency) -> bool {
        if self.currency.as_ref() == Some(currency) {
            return true;
        }

        match (&self.sub_account_address, &account.sub_account) {
            (Some(address), Some(sub_account)) => *address == sub_account.address,
            _ => false,
        }
    }

    /// Whether a deviation of `live - computed` is tolerated.
    pub fn allows(&self, live_minus_computed: &IntegerAmount) -> bool {
        match self.exemption_type {
            ExemptionType::Dynamic => true,
            ExemptionType::GreaterOrEqual => !live_minus_computed.is_negative(),
            ExemptionType::LessOrEqual => !live_minus_computed.is_positive(),
        }
    }
}

/// Exemptions that apply to `account` in `currency`.
pub fn find_exemptions<'a>(
    exemptions: &'a [BalanceExemption],
    account: &AccountIdentifier,
    currency: &Currency,
) -> Vec<&'a BalanceExemption> {
    exemptions
        .iter()
        .filter(|exemption| exemption.applies_to(account, currency))
        .collect()
}

/// First exemption among `matched` that tolerates the deviation.
pub fn match_balance_exemption<'a>(
    matched: &[&'a BalanceExemption],
    live_minus_computed: &IntegerAmount,
) -> Option<&'a BalanceExemption> {
    matched
        .iter()
        .copied()
        .find(|exemption| exemption.allows(live_minus_computed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockcheck_domain::entities::SubAccountIdentifier;

    fn staking() -> BalanceExemption {
        BalanceExemption {
            sub_account_address: Some("stake".to_string()),
            currency: None,
            exemption_type: ExemptionType::GreaterOrEqual,
        }
    }

    #[test]
    fn test_applies_by_sub_account_or_currency() {
        let staked =
            AccountIdentifier::new("a").with_sub_account(SubAccountIdentifier::new("stake"));
        let plain = AccountIdentifier::new("a");
        let btc = Currency::new("BTC", 8);

        assert!(staking().applies_to(&staked, &btc));
        assert!(!staking().applies_to(&plain, &btc));

        let by_currency = BalanceExemption {
            sub_account_address: None,
            currency: Some(btc.clone()),
            exemption_type: ExemptionType::Dynamic,
        };
        assert!(by_currency.applies_to(&plain, &btc));
        assert!(!by_currency.applies_to(&plain, &Currency::new("ETH", 18)));
    }

    #[test]
    fn test_match_balance_exemption_by_sign() {
        let exemptions = vec![staking()];
        let staked =
            AccountIdentifier::new("a").with_sub_account(SubAccountIdentifier::new("stake"));
        let matched = find_exemptions(&exemptions, &staked, &Currency::new("BTC", 8));
        assert_eq!(matched.len(), 1);

        let gain: IntegerAmount = "10".parse().unwrap();
        let loss: IntegerAmount = "-10".parse().unwrap();
        assert!(match_balance_exemption(&matched, &gain).is_some());
        assert!(match_balance_exemption(&matched, &IntegerAmount::zero()).is_some());
        assert!(match_balance_exemption(&matched, &loss).is_none());
    }
}
