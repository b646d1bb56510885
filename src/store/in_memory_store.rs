use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::{
    account::{AccountId, AccountType},
    command::{Customer, TransactionKind},
};

use super::{
    AccountSummary, LedgerStore, StoreError, TransactionId, TransactionRecord, account_number,
};

#[derive(Debug, Clone)]
struct StoredAccount {
    holder: String,
    account_type: AccountType,
    balance: Decimal,
}

/// Store kept entirely in process memory.
///
/// Grouped writes are atomic: a failing group restores the balances captured
/// before it started and drops the records it appended.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    accounts: BTreeMap<AccountId, StoredAccount>,
    transactions: Vec<TransactionRecord>,
}

impl InMemoryStore {
    fn account(&self, account_id: AccountId) -> Result<&StoredAccount, StoreError> {
        self.accounts
            .get(&account_id)
            .ok_or(StoreError::NotFound(account_id))
    }
}

impl LedgerStore for InMemoryStore {
    fn create_account(
        &mut self,
        customer: &Customer,
        account_type: AccountType,
    ) -> Result<AccountId, StoreError> {
        let id = self
            .accounts
            .last_key_value()
            .map_or(1, |(last_id, _)| last_id + 1);
        self.accounts.insert(
            id,
            StoredAccount {
                holder: customer.display_name(),
                account_type,
                balance: Decimal::new(0, 2),
            },
        );
        Ok(id)
    }

    fn account_type(&self, account_id: AccountId) -> Result<AccountType, StoreError> {
        Ok(self.account(account_id)?.account_type)
    }

    fn load_balance(&self, account_id: AccountId) -> Result<Decimal, StoreError> {
        Ok(self.account(account_id)?.balance)
    }

    fn save_balance(
        &mut self,
        account_id: AccountId,
        new_balance: Decimal,
    ) -> Result<(), StoreError> {
        let acc = self
            .accounts
            .get_mut(&account_id)
            .ok_or(StoreError::NotFound(account_id))?;
        acc.balance = new_balance;
        Ok(())
    }

    fn append_transaction(
        &mut self,
        account_id: AccountId,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        self.account(account_id)?;
        let id = self.transactions.len() as TransactionId + 1;
        self.transactions.push(TransactionRecord {
            id,
            account_id,
            kind,
            amount,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError> {
        Ok(self
            .accounts
            .iter()
            .map(|(id, acc)| AccountSummary {
                id: *id,
                account_number: account_number(*id),
                holder: acc.holder.clone(),
                account_type: acc.account_type,
                balance: acc.balance,
            })
            .collect())
    }

    fn list_transactions(
        &self,
        account_id: AccountId,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        self.account(account_id)?;
        let mut records: Vec<TransactionRecord> = self
            .transactions
            .iter()
            .filter(|record| record.account_id == account_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    fn atomically<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Self) -> Result<T, StoreError>,
    {
        let accounts = self.accounts.clone();
        let recorded = self.transactions.len();
        let result = f(self);
        if result.is_err() {
            self.accounts = accounts;
            self.transactions.truncate(recorded);
        }
        result
    }
}
