use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// The credits an account holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Balance {
    Limited(u64),
    /// Never debited and never short of credits
    Unlimited,
}

impl Balance {
    pub fn covers(&self, cost: u64) -> bool {
        match self {
            Balance::Limited(credits) => *credits >= cost,
            Balance::Unlimited => true,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Balance::Unlimited)
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Balance::Limited(credits) => write!(f, "{}", credits),
            Balance::Unlimited => write!(f, "unlimited"),
        }
    }
}

/// Serialized as a number of credits, or the string "unlimited".
impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Balance::Limited(credits) => serializer.serialize_u64(*credits),
            Balance::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BalanceError {
    #[error("the balance of {balance} credits does not cover the cost of {cost}")]
    Insufficient { balance: u64, cost: u64 },
    #[error("the balance store failed: {0}")]
    Store(String),
}

/// Where account balances live. Implementations must make `debit` atomic:
/// concurrent debits never take a balance below zero.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn balance(&self, account: &str) -> Result<Balance, BalanceError>;

    /// Subtracts `amount` and returns the new balance. Unlimited balances are
    /// returned unchanged.
    async fn debit(&self, account: &str, amount: u64) -> Result<Balance, BalanceError>;
}

/// A process-local balance store. Unknown accounts hold no credits.
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    accounts: DashMap<String, Balance>,
}

impl InMemoryBalanceStore {
    pub fn new() -> InMemoryBalanceStore {
        InMemoryBalanceStore::default()
    }

    pub fn with_account<S: Into<String>>(self, account: S, balance: Balance) -> Self {
        self.set(account, balance);
        self
    }

    pub fn set<S: Into<String>>(&self, account: S, balance: Balance) {
        self.accounts.insert(account.into(), balance);
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn balance(&self, account: &str) -> Result<Balance, BalanceError> {
        Ok(self
            .accounts
            .get(account)
            .map(|entry| *entry)
            .unwrap_or(Balance::Limited(0)))
    }

    async fn debit(&self, account: &str, amount: u64) -> Result<Balance, BalanceError> {
        // The entry stays locked until the guard is dropped
        let mut entry = self
            .accounts
            .entry(account.to_string())
            .or_insert(Balance::Limited(0));

        match *entry {
            Balance::Unlimited => Ok(Balance::Unlimited),
            Balance::Limited(credits) if credits >= amount => {
                *entry = Balance::Limited(credits - amount);
                Ok(*entry)
            }
            Balance::Limited(credits) => Err(BalanceError::Insufficient {
                balance: credits,
                cost: amount,
            }),
        }
    }
}
