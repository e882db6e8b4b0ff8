pub mod amount;
pub mod balance;
pub mod currency;
pub mod identifiers;

pub use amount::IntegerAmount;
pub use balance::{AccountCurrency, BalanceChange};
pub use currency::{Amount, Currency};
pub use identifiers::{
    BlockIdentifier, CoinIdentifier, NetworkIdentifier, OperationIdentifier,
    PartialBlockIdentifier, TransactionIdentifier,
};
