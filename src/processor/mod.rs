use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::{AccountError, AccountId},
    command::{Command, CommandError},
    store::StoreError,
};

pub mod teller;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    CommandErr(#[from] CommandError),
    #[error(transparent)]
    AccountErr(#[from] AccountError),
    #[error(transparent)]
    StoreErr(#[from] StoreError),
}

/// Failure category surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidAmount,
    InsufficientFunds,
    InvalidTransfer,
    NotFound,
    PersistenceFailure,
    InterestNotSupported,
    InvalidCustomer,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidAmount => "invalid amount",
            ErrorKind::InsufficientFunds => "insufficient funds",
            ErrorKind::InvalidTransfer => "invalid transfer",
            ErrorKind::NotFound => "not found",
            ErrorKind::PersistenceFailure => "persistence failure",
            ErrorKind::InterestNotSupported => "interest not supported",
            ErrorKind::InvalidCustomer => "invalid customer",
        };
        f.write_str(name)
    }
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::CommandErr(err) => match err {
                CommandError::MalformedAmount { .. }
                | CommandError::NonPositiveAmount { .. }
                | CommandError::AmountRequired { .. } => ErrorKind::InvalidAmount,
                CommandError::DestinationRequired | CommandError::SameAccountTransfer { .. } => {
                    ErrorKind::InvalidTransfer
                }
                CommandError::BlankCustomerField { .. } => ErrorKind::InvalidCustomer,
            },
            ProcessError::AccountErr(err) => match err {
                AccountError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
                AccountError::InterestNotSupported { .. } => ErrorKind::InterestNotSupported,
                AccountError::InvalidAmount { .. }
                | AccountError::NegativeRate { .. }
                | AccountError::BalanceOverflow { .. }
                | AccountError::Unrepresentable { .. } => ErrorKind::InvalidAmount,
            },
            ProcessError::StoreErr(err) => match err {
                StoreError::NotFound(_) => ErrorKind::NotFound,
                StoreError::Unavailable(_) | StoreError::Corrupt { .. } | StoreError::Sqlite(_) => {
                    ErrorKind::PersistenceFailure
                }
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub from: AccountId,
    pub from_balance: Decimal,
    pub to: AccountId,
    pub to_balance: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestReceipt {
    pub account_id: AccountId,
    pub interest: Decimal,
    pub balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Deposited {
        account_id: AccountId,
        amount: Decimal,
        balance: Decimal,
    },
    Withdrawn {
        account_id: AccountId,
        amount: Decimal,
        balance: Decimal,
    },
    Transferred(TransferReceipt),
    InterestAccrued(InterestReceipt),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Deposited {
                account_id,
                amount,
                balance,
            } => write!(
                f,
                "Deposited {amount} into account {account_id}, new balance {balance}"
            ),
            Outcome::Withdrawn {
                account_id,
                amount,
                balance,
            } => write!(
                f,
                "Withdrew {amount} from account {account_id}, new balance {balance}"
            ),
            Outcome::Transferred(receipt) => write!(
                f,
                "Transferred {} from account {} (balance {}) to account {} (balance {})",
                receipt.amount, receipt.from, receipt.from_balance, receipt.to, receipt.to_balance
            ),
            Outcome::InterestAccrued(receipt) => write!(
                f,
                "Credited interest {} to account {}, new balance {}",
                receipt.interest, receipt.account_id, receipt.balance
            ),
        }
    }
}

/// Entry point for batch and interactive front ends.
///
/// NOTE: [`teller::Teller`] is the only implementation so far.
pub trait TransactionProcessor {
    fn process(&mut self, command: Command) -> Result<Outcome, ProcessError>;
}
