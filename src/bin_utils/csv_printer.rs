use std::io::Write;

use chrono::SecondsFormat;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    account::{AccountId, AccountType},
    command::TransactionKind,
    store::{AccountSummary, TransactionId, TransactionRecord},
};

#[derive(Debug, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: String,
    pub holder: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub balance: Decimal,
}

impl From<AccountSummary> for Account {
    fn from(summary: AccountSummary) -> Self {
        Self {
            id: summary.id,
            account_number: summary.account_number,
            holder: summary.holder,
            account_type: summary.account_type,
            balance: summary.balance,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub timestamp: String,
}

impl From<TransactionRecord> for Transaction {
    fn from(record: TransactionRecord) -> Self {
        Self {
            transaction_id: record.id,
            kind: record.kind,
            amount: record.amount,
            timestamp: record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

pub fn print_accounts<W>(
    output: &mut W,
    accounts: impl Iterator<Item = AccountSummary>,
) -> anyhow::Result<()>
where
    W: Write,
{
    print_rows(output, accounts.map(Account::from))
}

pub fn print_history<W>(
    output: &mut W,
    records: impl Iterator<Item = TransactionRecord>,
) -> anyhow::Result<()>
where
    W: Write,
{
    print_rows(output, records.map(Transaction::from))
}

fn print_rows<W, T>(output: &mut W, rows: impl Iterator<Item = T>) -> anyhow::Result<()>
where
    W: Write,
    T: Serialize,
{
    let mut writer = Writer::from_writer(output);
    for row in rows {
        if let Err(err) = writer.serialize(row) {
            anyhow::bail!("Failed to write to CSV: {err}")
        }
    }
    // Ensure all data is flushed to the output
    if let Err(err) = writer.flush() {
        anyhow::bail!("Failed to flush CSV writer: {err}")
    }
    Ok(())
}
