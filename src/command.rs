use std::{fmt, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::{AccountId, AccountType};

/// Kind of a ledger record, written only as a side effect of a balance change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    TransferOut,
    TransferIn,
    Interest,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdraw => "withdraw",
            TransactionKind::TransferOut => "transfer_out",
            TransactionKind::TransferIn => "transfer_in",
            TransactionKind::Interest => "interest",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdraw" => Ok(TransactionKind::Withdraw),
            "transfer_out" => Ok(TransactionKind::TransferOut),
            "transfer_in" => Ok(TransactionKind::TransferIn),
            "interest" => Ok(TransactionKind::Interest),
            other => Err(other.to_string()),
        }
    }
}

/// Operation requested by the operator.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Deposit,
    Withdraw,
    Transfer,
    Interest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Deposit { account_id: AccountId, amount: Decimal },
    Withdraw { account_id: AccountId, amount: Decimal },
    Transfer(TransferCommand),
    AccrueInterest { account_id: AccountId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl Customer {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAccountCommand {
    pub customer: Customer,
    pub account_type: AccountType,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("`{input}` is not a valid decimal amount")]
    MalformedAmount { input: String },
    #[error("Amount must be greater than zero, got {amount}")]
    NonPositiveAmount { amount: Decimal },
    #[error("Amount is required for {kind:?}")]
    AmountRequired { kind: OperationKind },
    #[error("Destination account is required for a transfer")]
    DestinationRequired,
    #[error("Source and destination accounts cannot be the same (account {account_id})")]
    SameAccountTransfer { account_id: AccountId },
    #[error("Customer field `{field}` must not be blank")]
    BlankCustomerField { field: &'static str },
}

/// Parses operator input into an exact decimal, without rounding.
pub fn parse_amount(input: &str) -> Result<Decimal, CommandError> {
    let trimmed = input.trim();
    Decimal::from_str_exact(trimmed).map_err(|_| CommandError::MalformedAmount {
        input: trimmed.to_string(),
    })
}

pub fn ensure_positive(amount: Decimal) -> Result<Decimal, CommandError> {
    if amount > Decimal::ZERO {
        Ok(amount)
    } else {
        Err(CommandError::NonPositiveAmount { amount })
    }
}

impl TransferCommand {
    /// Rejects same-account transfers and non-positive amounts, nothing is loaded yet.
    pub fn new(from: AccountId, to: AccountId, amount: Decimal) -> Result<Self, CommandError> {
        if from == to {
            return Err(CommandError::SameAccountTransfer { account_id: from });
        }
        Ok(Self {
            from,
            to,
            amount: ensure_positive(amount)?,
        })
    }
}

impl Command {
    pub fn deposit(account_id: AccountId, amount: Decimal) -> Result<Self, CommandError> {
        Ok(Self::Deposit {
            account_id,
            amount: ensure_positive(amount)?,
        })
    }

    pub fn withdraw(account_id: AccountId, amount: Decimal) -> Result<Self, CommandError> {
        Ok(Self::Withdraw {
            account_id,
            amount: ensure_positive(amount)?,
        })
    }

    pub fn transfer(
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<Self, CommandError> {
        Ok(Self::Transfer(TransferCommand::new(from, to, amount)?))
    }

    pub fn parse_command(
        kind: OperationKind,
        account_id: AccountId,
        to: Option<AccountId>,
        amount: Option<&str>,
    ) -> Result<Self, CommandError> {
        let amount = amount.map(str::trim).filter(|amount| !amount.is_empty());
        match kind {
            OperationKind::Deposit => {
                Self::deposit(account_id, Self::parse_required_amount(kind, amount)?)
            }
            OperationKind::Withdraw => {
                Self::withdraw(account_id, Self::parse_required_amount(kind, amount)?)
            }
            OperationKind::Transfer => {
                let to = to.ok_or(CommandError::DestinationRequired)?;
                Self::transfer(account_id, to, Self::parse_required_amount(kind, amount)?)
            }
            OperationKind::Interest => Ok(Self::AccrueInterest { account_id }),
        }
    }

    fn parse_required_amount(
        kind: OperationKind,
        amount: Option<&str>,
    ) -> Result<Decimal, CommandError> {
        match amount {
            Some(amount) => parse_amount(amount),
            None => Err(CommandError::AmountRequired { kind }),
        }
    }
}

impl OpenAccountCommand {
    pub fn new(customer: Customer, account_type: AccountType) -> Result<Self, CommandError> {
        let fields = [
            ("first_name", &customer.first_name),
            ("last_name", &customer.last_name),
            ("email", &customer.email),
            ("phone", &customer.phone),
        ];
        if let Some(&(field, _)) = fields.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(CommandError::BlankCustomerField { field });
        }
        Ok(Self {
            customer: Customer {
                first_name: customer.first_name.trim().to_string(),
                last_name: customer.last_name.trim().to_string(),
                email: customer.email.trim().to_string(),
                phone: customer.phone.trim().to_string(),
            },
            account_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_amounts() {
        assert_eq!(parse_amount("200.00").unwrap(), dec!(200.00));
        assert_eq!(parse_amount(" 0.01 ").unwrap(), dec!(0.01));
        assert_eq!(parse_amount("-3").unwrap(), dec!(-3));
        assert_eq!(
            parse_amount("12,5").unwrap_err(),
            CommandError::MalformedAmount {
                input: "12,5".to_string()
            }
        );
        assert!(parse_amount("abc").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn parse_command() {
        let cmd = Command::parse_command(OperationKind::Deposit, 1, None, Some("10.50")).unwrap();
        assert_eq!(
            cmd,
            Command::Deposit {
                account_id: 1,
                amount: dec!(10.50)
            }
        );

        let cmd =
            Command::parse_command(OperationKind::Transfer, 1, Some(2), Some("200.00")).unwrap();
        assert_eq!(
            cmd,
            Command::Transfer(TransferCommand {
                from: 1,
                to: 2,
                amount: dec!(200.00)
            })
        );

        // interest ignores the amount column
        let cmd = Command::parse_command(OperationKind::Interest, 4, None, Some("1")).unwrap();
        assert_eq!(cmd, Command::AccrueInterest { account_id: 4 });
    }

    #[test]
    fn parse_command_errors() {
        let err = Command::parse_command(OperationKind::Withdraw, 1, None, None).unwrap_err();
        assert_eq!(
            err,
            CommandError::AmountRequired {
                kind: OperationKind::Withdraw
            }
        );
        assert_eq!(err.to_string(), "Amount is required for Withdraw");

        let err = Command::parse_command(OperationKind::Deposit, 1, None, Some("  ")).unwrap_err();
        assert!(matches!(err, CommandError::AmountRequired { .. }));

        let err = Command::parse_command(OperationKind::Deposit, 1, None, Some("0")).unwrap_err();
        assert!(matches!(err, CommandError::NonPositiveAmount { .. }));

        let err =
            Command::parse_command(OperationKind::Transfer, 1, None, Some("5")).unwrap_err();
        assert_eq!(err, CommandError::DestinationRequired);
    }

    #[test]
    fn transfer_validation() {
        let err = TransferCommand::new(3, 3, dec!(10)).unwrap_err();
        assert_eq!(err, CommandError::SameAccountTransfer { account_id: 3 });

        // same account is reported before the amount
        let err = TransferCommand::new(3, 3, dec!(-10)).unwrap_err();
        assert_eq!(err, CommandError::SameAccountTransfer { account_id: 3 });

        let err = TransferCommand::new(3, 4, dec!(0)).unwrap_err();
        assert!(matches!(err, CommandError::NonPositiveAmount { .. }));
    }

    #[test]
    fn open_account_validation() {
        let customer = Customer {
            first_name: " Asha ".to_string(),
            last_name: "Rao".to_string(),
            email: "asha@example.com".to_string(),
            phone: "555-0101".to_string(),
        };
        let cmd = OpenAccountCommand::new(customer.clone(), AccountType::Current).unwrap();
        assert_eq!(cmd.customer.display_name(), "Asha Rao");

        let err = OpenAccountCommand::new(
            Customer {
                email: " ".to_string(),
                ..customer
            },
            AccountType::Savings,
        )
        .unwrap_err();
        assert_eq!(err, CommandError::BlankCustomerField { field: "email" });
    }

    #[test]
    fn transaction_kind_names() {
        for kind in [
            TransactionKind::Deposit,
            TransactionKind::Withdraw,
            TransactionKind::TransferOut,
            TransactionKind::TransferIn,
            TransactionKind::Interest,
        ] {
            assert_eq!(kind.as_str().parse::<TransactionKind>(), Ok(kind));
        }
        assert!("refund".parse::<TransactionKind>().is_err());
    }
}
