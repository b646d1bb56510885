use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    account::{AccountId, AccountType},
    command::{Customer, TransactionKind},
};

pub mod in_memory_store;
pub mod sqlite_store;

pub type TransactionId = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Account {0} not found")]
    NotFound(AccountId),
    /// Backend could not be reached. Not produced by the bundled stores;
    /// for [`LedgerStore`] implementations over remote or pooled backends.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Stored {field} `{value}` is corrupt")]
    Corrupt { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub id: AccountId,
    pub account_number: String,
    pub holder: String,
    pub account_type: AccountType,
    pub balance: Decimal,
}

/// Immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

pub fn account_number(id: AccountId) -> String {
    format!("ACC{id:08}")
}

/// Balance and ledger storage the teller reads from and writes to.
///
/// Every call either completes or fails outright, there are no retries.
pub trait LedgerStore {
    fn create_account(
        &mut self,
        customer: &Customer,
        account_type: AccountType,
    ) -> Result<AccountId, StoreError>;

    fn account_type(&self, account_id: AccountId) -> Result<AccountType, StoreError>;

    fn load_balance(&self, account_id: AccountId) -> Result<Decimal, StoreError>;

    fn save_balance(&mut self, account_id: AccountId, new_balance: Decimal)
    -> Result<(), StoreError>;

    fn append_transaction(
        &mut self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<(), StoreError>;

    /// All accounts ordered by id.
    fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError>;

    /// Ledger of one account, most recent first.
    fn list_transactions(&self, account_id: AccountId)
    -> Result<Vec<TransactionRecord>, StoreError>;

    /// Runs a group of writes as one unit.
    ///
    /// The default just runs `f`: if a write inside fails, earlier writes stay
    /// applied. Stores with transactions override this to commit or roll back
    /// the whole group.
    fn atomically<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Self) -> Result<T, StoreError>,
    {
        f(self)
    }
}
