pub mod account;
pub mod block;
pub mod operation;

pub use account::{AccountIdentifier, SubAccountIdentifier};
pub use block::{Block, NetworkStatus, Transaction};
pub use operation::{CoinAction, CoinChange, Operation};
