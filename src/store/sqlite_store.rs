use std::{path::Path, str::FromStr};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use crate::{
    account::{AccountId, AccountType},
    command::{Customer, TransactionKind},
};

use super::{
    AccountSummary, LedgerStore, StoreError, TransactionId, TransactionRecord, account_number,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS customers (
        customer_id INTEGER PRIMARY KEY AUTOINCREMENT,
        first_name  TEXT NOT NULL,
        last_name   TEXT NOT NULL,
        email       TEXT NOT NULL,
        phone       TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS accounts (
        account_id     INTEGER PRIMARY KEY AUTOINCREMENT,
        account_number TEXT UNIQUE,
        customer_id    INTEGER NOT NULL REFERENCES customers(customer_id),
        account_type   TEXT NOT NULL,
        balance        TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS transactions (
        transaction_id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id     INTEGER NOT NULL REFERENCES accounts(account_id),
        type           TEXT NOT NULL,
        amount         TEXT NOT NULL,
        timestamp      TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_transactions_account
        ON transactions(account_id, timestamp);
";

/// SQLite backed store.
///
/// Amounts are kept as decimal text so no value ever passes through a float,
/// timestamps as fixed-width RFC 3339 text so they sort lexically.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn ensure_exists(&self, account_id: AccountId) -> Result<(), StoreError> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM accounts WHERE account_id = ?1",
                params![account_id],
                |_| Ok(()),
            )
            .optional()?;
        found.ok_or(StoreError::NotFound(account_id))
    }
}

fn parse_decimal(field: &'static str, value: String) -> Result<Decimal, StoreError> {
    Decimal::from_str_exact(&value).map_err(|_| StoreError::Corrupt { field, value })
}

fn parse_account_type(value: String) -> Result<AccountType, StoreError> {
    AccountType::from_str(&value).map_err(|_| StoreError::Corrupt {
        field: "account_type",
        value,
    })
}

impl LedgerStore for SqliteStore {
    fn create_account(
        &mut self,
        customer: &Customer,
        account_type: AccountType,
    ) -> Result<AccountId, StoreError> {
        self.atomically(|store| {
            store.conn.execute(
                "INSERT INTO customers (first_name, last_name, email, phone)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    customer.first_name,
                    customer.last_name,
                    customer.email,
                    customer.phone
                ],
            )?;
            let customer_id = store.conn.last_insert_rowid();
            store.conn.execute(
                "INSERT INTO accounts (customer_id, account_type, balance) VALUES (?1, ?2, ?3)",
                params![
                    customer_id,
                    account_type.as_str(),
                    Decimal::new(0, 2).to_string()
                ],
            )?;
            let rowid = store.conn.last_insert_rowid();
            let account_id = AccountId::try_from(rowid).map_err(|_| StoreError::Corrupt {
                field: "account_id",
                value: rowid.to_string(),
            })?;
            store.conn.execute(
                "UPDATE accounts SET account_number = ?1 WHERE account_id = ?2",
                params![account_number(account_id), account_id],
            )?;
            Ok(account_id)
        })
    }

    fn account_type(&self, account_id: AccountId) -> Result<AccountType, StoreError> {
        let value: String = self
            .conn
            .query_row(
                "SELECT account_type FROM accounts WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound(account_id))?;
        parse_account_type(value)
    }

    fn load_balance(&self, account_id: AccountId) -> Result<Decimal, StoreError> {
        let value: String = self
            .conn
            .query_row(
                "SELECT balance FROM accounts WHERE account_id = ?1",
                params![account_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound(account_id))?;
        parse_decimal("balance", value)
    }

    fn save_balance(
        &mut self,
        account_id: AccountId,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        let updated = self.conn.execute(
            "UPDATE accounts SET balance = ?1 WHERE account_id = ?2",
            params![new_balance.to_string(), account_id],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(account_id));
        }
        Ok(())
    }

    fn append_transaction(
        &mut self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        self.ensure_exists(account_id)?;
        self.conn.execute(
            "INSERT INTO transactions (account_id, type, amount, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account_id,
                kind.as_str(),
                amount.to_string(),
                Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
            ],
        )?;
        Ok(())
    }

    fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT a.account_id, a.account_number, c.first_name, c.last_name,
                    a.account_type, a.balance
             FROM accounts a
             JOIN customers c ON a.customer_id = c.customer_id
             ORDER BY a.account_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, AccountId>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut accounts = Vec::new();
        for row in rows {
            let (id, number, first_name, last_name, account_type, balance) = row?;
            accounts.push(AccountSummary {
                id,
                account_number: number.unwrap_or_else(|| account_number(id)),
                holder: format!("{first_name} {last_name}"),
                account_type: parse_account_type(account_type)?,
                balance: parse_decimal("balance", balance)?,
            });
        }
        Ok(accounts)
    }

    fn list_transactions(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        self.ensure_exists(account_id)?;
        let mut stmt = self.conn.prepare(
            "SELECT transaction_id, type, amount, timestamp
             FROM transactions
             WHERE account_id = ?1
             ORDER BY timestamp DESC, transaction_id DESC",
        )?;
        let rows = stmt.query_map(params![account_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, kind, amount, timestamp) = row?;
            let kind = TransactionKind::from_str(&kind).map_err(|value| StoreError::Corrupt {
                field: "type",
                value,
            })?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .map_err(|_| StoreError::Corrupt {
                    field: "timestamp",
                    value: timestamp.clone(),
                })?
                .with_timezone(&Utc);
            records.push(TransactionRecord {
                id: id as TransactionId,
                account_id,
                kind,
                amount: parse_decimal("amount", amount)?,
                timestamp,
            });
        }
        Ok(records)
    }

    fn atomically<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Self) -> Result<T, StoreError>,
    {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = f(self).and_then(|value| {
            self.conn.execute_batch("COMMIT")?;
            Ok(value)
        });
        // A failed COMMIT (deferred constraint, busy database) keeps the transaction open.
        if result.is_err() && !self.conn.is_autocommit() {
            if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %rollback_err, "Failed to roll back store transaction");
            }
        }
        result
    }
}
