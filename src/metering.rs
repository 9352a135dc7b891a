//! Credit metering. The [`cost::CostTable`] prices a request before it is
//! dispatched and the [`balance::BalanceStore`] is debited once a result has
//! been persisted.

pub mod balance;
pub mod cost;

pub use balance::{Balance, BalanceError, BalanceStore, InMemoryBalanceStore};
pub use cost::CostTable;
