//! Front-end glue around [`crate::processor`]: configuration, CSV batches in,
//! CSV reports out. Kept in the library so integration tests can drive it.

use std::{
    collections::HashSet,
    io::{Read, Write},
};

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    account::{AccountId, AccountType, UnknownAccountType},
    command::{Command, Customer, OpenAccountCommand},
    processor::{ProcessError, TransactionProcessor, teller::Teller},
    store::LedgerStore,
};
use csv_parser::{CsvRecordParser, CustomerRow, OperationRow};
use csv_printer::print_accounts;

pub mod config;
pub mod csv_parser;
pub mod csv_printer;

#[derive(Debug, Error)]
pub enum RowError {
    #[error("Malformed row: {0}")]
    Malformed(#[from] csv::Error),
    #[error(transparent)]
    AccountType(#[from] UnknownAccountType),
    #[error("Customer with e-mail `{0}` already appears earlier in the file")]
    DuplicateEmail(String),
    #[error("{}: {}", .0.kind(), .0)]
    Process(#[from] ProcessError),
}

/// Processed and rejected row counts of one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub rejected: usize,
}

pub struct Service<'w, R, W: 'w, S> {
    pub input: R,
    pub output: &'w mut W,
    pub teller: &'w mut Teller<S>,
    pub error_printer: Box<dyn FnMut(u64, RowError)>,
}

impl<'w, R, W, S> Service<'w, R, W, S>
where
    R: Read,
    W: Write + 'w,
    S: LedgerStore,
{
    /// Applies every operation row in order, then prints all accounts.
    pub fn run_operations(mut self) -> Result<BatchSummary> {
        let parser = CsvRecordParser::<_, OperationRow>::new(self.input)
            .context("Failed to read operation batch header")?;
        let mut summary = BatchSummary::default();

        for (line, row) in parser {
            let result = row
                .map_err(RowError::from)
                .and_then(|row| {
                    Command::parse_command(row.kind, row.account, row.to, row.amount.as_deref())
                        .map_err(|err| ProcessError::from(err).into())
                })
                .and_then(|command| self.teller.process(command).map_err(RowError::from));
            match result {
                Ok(outcome) => {
                    debug!(line, %outcome, "Processed operation");
                    summary.processed += 1;
                }
                Err(err) => {
                    warn!(line, error = %err, "Rejected operation");
                    summary.rejected += 1;
                    (self.error_printer)(line, err);
                }
            }
        }
        info!(
            processed = summary.processed,
            rejected = summary.rejected,
            "Operation batch finished"
        );

        print_accounts(self.output, self.teller.accounts()?.into_iter())?;
        Ok(summary)
    }

    /// Opens one account per customer row, then prints all accounts.
    ///
    /// Rows repeating an e-mail seen earlier in the same file are rejected.
    pub fn import_customers(mut self) -> Result<Vec<AccountId>> {
        let parser = CsvRecordParser::<_, CustomerRow>::new(self.input)
            .context("Failed to read customer file header")?;
        let mut seen_emails = HashSet::new();
        let mut opened = Vec::new();

        for (line, row) in parser {
            let result = row.map_err(RowError::from).and_then(|row| {
                let account_type = match row.account_type.as_deref().map(str::trim) {
                    Some(account_type) if !account_type.is_empty() => account_type.parse()?,
                    _ => AccountType::default(),
                };
                let email = row.email.trim().to_ascii_lowercase();
                let command = OpenAccountCommand::new(
                    Customer {
                        first_name: row.first_name,
                        last_name: row.last_name,
                        email: row.email,
                        phone: row.phone,
                    },
                    account_type,
                )
                .map_err(ProcessError::from)?;
                if !seen_emails.insert(email.clone()) {
                    return Err(RowError::DuplicateEmail(email));
                }
                Ok(self.teller.open_account(command)?)
            });
            match result {
                Ok(account_id) => opened.push(account_id),
                Err(err) => {
                    warn!(line, error = %err, "Rejected customer");
                    (self.error_printer)(line, err);
                }
            }
        }
        info!(opened = opened.len(), "Customer import finished");

        print_accounts(self.output, self.teller.accounts()?.into_iter())?;
        Ok(opened)
    }
}
