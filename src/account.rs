use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type AccountId = u32;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Savings,
    Current,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Savings => "savings",
            AccountType::Current => "current",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown account type `{0}`, expected `savings` or `current`")]
pub struct UnknownAccountType(pub String);

impl FromStr for AccountType {
    type Err = UnknownAccountType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "savings" => Ok(AccountType::Savings),
            "current" => Ok(AccountType::Current),
            _ => Err(UnknownAccountType(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum AccountError {
    #[error("Amount must be greater than zero, got {amount}")]
    InvalidAmount { amount: Decimal },
    #[error("Insufficient funds: balance is {balance}, requested {requested}")]
    InsufficientFunds {
        balance: Decimal,
        requested: Decimal,
    },
    #[error("Account {account_id} does not accrue interest")]
    InterestNotSupported { account_id: AccountId },
    #[error("Interest rate must not be negative, got {rate}")]
    NegativeRate { rate: Decimal },
    #[error("Balance of account {account_id} would overflow")]
    BalanceOverflow { account_id: AccountId },
    #[error("{value} cannot be represented as an exact decimal amount")]
    Unrepresentable { value: f64 },
}

/// Fixed interest rate of an interest-bearing account, as a decimal fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterestPolicy {
    rate: Decimal,
}

impl InterestPolicy {
    pub fn new(rate: Decimal) -> Result<Self, AccountError> {
        if rate < Decimal::ZERO {
            return Err(AccountError::NegativeRate { rate });
        }
        Ok(Self { rate })
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }
}

/// Converts a binary float into an exact decimal amount.
///
/// Goes through the shortest decimal text that round-trips to the same float,
/// so `0.1_f64` becomes exactly `0.1` rather than the nearest binary fraction.
pub fn amount_from_f64(value: f64) -> Result<Decimal, AccountError> {
    if !value.is_finite() {
        return Err(AccountError::Unrepresentable { value });
    }
    Decimal::from_str_exact(&value.to_string())
        .map(|amount| amount.normalize())
        .map_err(|_| AccountError::Unrepresentable { value })
}

/// Account balance loaded for the duration of a single operation.
///
/// Values are built from the freshly loaded balance and dropped once the new
/// balance has been persisted, the store stays the source of truth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    id: AccountId,
    balance: Decimal,
    interest: Option<InterestPolicy>,
}

impl Account {
    pub fn new(id: AccountId, balance: Decimal) -> Self {
        Self {
            id,
            balance,
            interest: None,
        }
    }

    pub fn with_interest(id: AccountId, balance: Decimal, policy: InterestPolicy) -> Self {
        Self {
            id,
            balance,
            interest: Some(policy),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn interest_policy(&self) -> Option<InterestPolicy> {
        self.interest
    }

    pub fn deposit(&mut self, amount: Decimal) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount { amount });
        }
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(AccountError::BalanceOverflow { account_id: self.id })?;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), AccountError> {
        if amount <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount { amount });
        }
        if amount > self.balance {
            return Err(AccountError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Credits `balance * rate` and returns the credited interest.
    ///
    /// Only interest-bearing accounts support this, plain accounts fail with
    /// [`AccountError::InterestNotSupported`].
    ///
    /// The result is not rounded, so the balance scale grows by the rate's
    /// scale on every accrual. Past 28 fractional digits the product is rounded
    /// to what [`Decimal`] can hold.
    pub fn accrue_interest(&mut self) -> Result<Decimal, AccountError> {
        let Some(policy) = self.interest else {
            return Err(AccountError::InterestNotSupported {
                account_id: self.id,
            });
        };
        let account_id = self.id;
        let overflow = || AccountError::BalanceOverflow { account_id };
        let interest = self
            .balance
            .checked_mul(policy.rate())
            .ok_or_else(overflow)?;
        self.balance = self.balance.checked_add(interest).ok_or_else(overflow)?;
        Ok(interest)
    }
}
