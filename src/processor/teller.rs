use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::{
    account::{Account, AccountId, AccountType, InterestPolicy},
    command::{Command, OpenAccountCommand, TransactionKind, TransferCommand, ensure_positive},
    store::{AccountSummary, LedgerStore, StoreError, TransactionRecord},
};

use super::{InterestReceipt, Outcome, ProcessError, TransferReceipt, TransactionProcessor};

/// Runs account operations against a [`LedgerStore`].
///
/// Each operation loads fresh balances, validates and applies the change on
/// [`Account`] values, and only then writes. A rejected operation never writes.
pub struct Teller<S> {
    store: S,
    savings_interest: InterestPolicy,
}

impl<S: LedgerStore> Teller<S> {
    pub fn new(store: S, savings_interest: InterestPolicy) -> Self {
        Self {
            store,
            savings_interest,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn open_account(&mut self, command: OpenAccountCommand) -> Result<AccountId, ProcessError> {
        let account_id = self
            .store
            .create_account(&command.customer, command.account_type)?;
        info!(
            account_id,
            account_type = %command.account_type,
            holder = %command.customer.display_name(),
            "Opened account"
        );
        Ok(account_id)
    }

    pub fn deposit(
        &mut self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Decimal, ProcessError> {
        let amount = ensure_positive(amount)?;
        let mut acc = self.load_account(account_id)?;
        acc.deposit(amount)?;
        self.commit(&acc, TransactionKind::Deposit, amount)?;
        info!(account_id, %amount, balance = %acc.balance(), "Deposited");
        Ok(acc.balance())
    }

    pub fn withdraw(
        &mut self,
        account_id: AccountId,
        amount: Decimal,
    ) -> Result<Decimal, ProcessError> {
        let amount = ensure_positive(amount)?;
        let mut acc = self.load_account(account_id)?;
        acc.withdraw(amount)?;
        self.commit(&acc, TransactionKind::Withdraw, amount)?;
        info!(account_id, %amount, balance = %acc.balance(), "Withdrew");
        Ok(acc.balance())
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Same-account and non-positive requests are rejected before anything is
    /// loaded. The withdrawal is applied before any write, so insufficient funds
    /// leave both accounts and the ledger untouched. Both balance writes and both
    /// ledger records go through [`LedgerStore::atomically`]; with a store that
    /// keeps the default, a failure between the writes can leave the source
    /// debited and the destination not yet credited.
    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
    ) -> Result<TransferReceipt, ProcessError> {
        let TransferCommand { from, to, amount } = TransferCommand::new(from, to, amount)?;

        let mut source = self.load_account(from)?;
        let mut destination = self.load_account(to)?;
        source.withdraw(amount)?;
        destination.deposit(amount)?;

        let from_balance = source.balance();
        let to_balance = destination.balance();
        self.store.atomically(|store| {
            store.save_balance(from, from_balance)?;
            store.save_balance(to, to_balance)?;
            store.append_transaction(from, TransactionKind::TransferOut, amount)?;
            store.append_transaction(to, TransactionKind::TransferIn, amount)
        })?;
        info!(from, to, %amount, %from_balance, %to_balance, "Transferred");

        Ok(TransferReceipt {
            from,
            from_balance,
            to,
            to_balance,
            amount,
        })
    }

    /// Credits interest to a savings account, current accounts are rejected.
    ///
    /// A zero interest amount changes nothing and writes no ledger record.
    pub fn accrue_interest(&mut self, account_id: AccountId) -> Result<InterestReceipt, ProcessError> {
        let account_type = self.store.account_type(account_id)?;
        let balance = self.store.load_balance(account_id)?;
        let mut acc = match account_type {
            AccountType::Savings => Account::with_interest(account_id, balance, self.savings_interest),
            AccountType::Current => Account::new(account_id, balance),
        };
        let interest = acc.accrue_interest()?;
        if interest > Decimal::ZERO {
            self.commit(&acc, TransactionKind::Interest, interest)?;
        }
        info!(account_id, %interest, balance = %acc.balance(), "Accrued interest");

        Ok(InterestReceipt {
            account_id,
            interest,
            balance: acc.balance(),
        })
    }

    pub fn accounts(&self) -> Result<Vec<AccountSummary>, ProcessError> {
        Ok(self.store.list_accounts()?)
    }

    pub fn history(&self, account_id: AccountId) -> Result<Vec<TransactionRecord>, ProcessError> {
        Ok(self.store.list_transactions(account_id)?)
    }

    fn load_account(&self, account_id: AccountId) -> Result<Account, StoreError> {
        let balance = self.store.load_balance(account_id)?;
        debug!(account_id, %balance, "Loaded balance");
        Ok(Account::new(account_id, balance))
    }

    fn commit(
        &mut self,
        acc: &Account,
        kind: TransactionKind,
        amount: Decimal,
    ) -> Result<(), StoreError> {
        let account_id = acc.id();
        let balance = acc.balance();
        self.store.atomically(|store| {
            store.save_balance(account_id, balance)?;
            store.append_transaction(account_id, kind, amount)
        })
    }
}

impl<S: LedgerStore> TransactionProcessor for Teller<S> {
    fn process(&mut self, command: Command) -> Result<Outcome, ProcessError> {
        match command {
            Command::Deposit { account_id, amount } => {
                let balance = self.deposit(account_id, amount)?;
                Ok(Outcome::Deposited {
                    account_id,
                    amount,
                    balance,
                })
            }
            Command::Withdraw { account_id, amount } => {
                let balance = self.withdraw(account_id, amount)?;
                Ok(Outcome::Withdrawn {
                    account_id,
                    amount,
                    balance,
                })
            }
            Command::Transfer(TransferCommand { from, to, amount }) => {
                Ok(Outcome::Transferred(self.transfer(from, to, amount)?))
            }
            Command::AccrueInterest { account_id } => {
                Ok(Outcome::InterestAccrued(self.accrue_interest(account_id)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use rust_decimal_macros::dec;

    use crate::{
        command::{CommandError, Customer},
        processor::ErrorKind,
        store::in_memory_store::InMemoryStore,
    };

    use super::*;

    fn customer(first_name: &str) -> Customer {
        Customer {
            first_name: first_name.to_string(),
            last_name: "Shah".to_string(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            phone: "555-0123".to_string(),
        }
    }

    fn savings_rate() -> InterestPolicy {
        InterestPolicy::new(dec!(0.02)).unwrap()
    }

    /// Teller over an in-memory store with one account per given balance.
    fn teller_with(accounts: &[(AccountType, Decimal)]) -> Teller<InMemoryStore> {
        let mut store = InMemoryStore::default();
        for (idx, (account_type, balance)) in accounts.iter().enumerate() {
            let id = store
                .create_account(&customer(&format!("Customer{idx}")), *account_type)
                .unwrap();
            store.save_balance(id, *balance).unwrap();
        }
        Teller::new(store, savings_rate())
    }

    /// Counts loads and fails saves for one account; keeps the default,
    /// non-atomic grouping.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStore,
        loads: Cell<usize>,
        fail_save_for: Option<AccountId>,
    }

    impl LedgerStore for FlakyStore {
        fn create_account(
            &mut self,
            customer: &Customer,
            account_type: AccountType,
        ) -> Result<AccountId, StoreError> {
            self.inner.create_account(customer, account_type)
        }

        fn account_type(&self, account_id: AccountId) -> Result<AccountType, StoreError> {
            self.inner.account_type(account_id)
        }

        fn load_balance(&self, account_id: AccountId) -> Result<Decimal, StoreError> {
            self.loads.set(self.loads.get() + 1);
            self.inner.load_balance(account_id)
        }

        fn save_balance(
            &mut self,
            account_id: AccountId,
            new_balance: Decimal,
        ) -> Result<(), StoreError> {
            if self.fail_save_for == Some(account_id) {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            self.inner.save_balance(account_id, new_balance)
        }

        fn append_transaction(
            &mut self,
            account_id: AccountId,
            kind: TransactionKind,
            amount: Decimal,
        ) -> Result<(), StoreError> {
            self.inner.append_transaction(account_id, kind, amount)
        }

        fn list_accounts(&self) -> Result<Vec<AccountSummary>, StoreError> {
            self.inner.list_accounts()
        }

        fn list_transactions(
            &self,
            account_id: AccountId,
        ) -> Result<Vec<TransactionRecord>, StoreError> {
            self.inner.list_transactions(account_id)
        }
    }

    fn flaky_teller(balances: &[Decimal]) -> Teller<FlakyStore> {
        let mut store = FlakyStore::default();
        for (idx, balance) in balances.iter().enumerate() {
            let id = store
                .create_account(&customer(&format!("Flaky{idx}")), AccountType::Current)
                .unwrap();
            store.save_balance(id, *balance).unwrap();
        }
        Teller::new(store, savings_rate())
    }

    #[test]
    fn transfer_moves_funds_and_records_both_sides() {
        let mut teller = teller_with(&[
            (AccountType::Savings, dec!(500.00)),
            (AccountType::Current, dec!(100.00)),
        ]);
        let receipt = teller.transfer(1, 2, dec!(200.00)).unwrap();
        assert_eq!(
            receipt,
            TransferReceipt {
                from: 1,
                from_balance: dec!(300.00),
                to: 2,
                to_balance: dec!(300.00),
                amount: dec!(200.00),
            }
        );
        assert_eq!(teller.store().load_balance(1).unwrap(), dec!(300.00));
        assert_eq!(teller.store().load_balance(2).unwrap(), dec!(300.00));

        let out = teller.history(1).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, TransactionKind::TransferOut);
        assert_eq!(out[0].amount, dec!(200.00));
        let incoming = teller.history(2).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].kind, TransactionKind::TransferIn);
        assert_eq!(incoming[0].amount, dec!(200.00));
    }

    #[test]
    fn transfer_with_insufficient_funds_changes_nothing() {
        let mut teller = teller_with(&[
            (AccountType::Current, dec!(50.00)),
            (AccountType::Current, dec!(10.00)),
        ]);
        let err = teller.transfer(1, 2, dec!(100.00)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(teller.store().load_balance(1).unwrap(), dec!(50.00));
        assert_eq!(teller.store().load_balance(2).unwrap(), dec!(10.00));
        assert!(teller.history(1).unwrap().is_empty());
        assert!(teller.history(2).unwrap().is_empty());
    }

    #[test]
    fn invalid_transfers_are_rejected_before_loading() {
        let mut teller = flaky_teller(&[dec!(500.00), dec!(100.00)]);

        let err = teller.transfer(1, 1, dec!(10.00)).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::CommandErr(CommandError::SameAccountTransfer { account_id: 1 })
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidTransfer);

        let err = teller.transfer(1, 2, dec!(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        let err = teller.transfer(1, 2, dec!(-5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        let err = teller.deposit(1, dec!(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        let err = teller.withdraw(1, dec!(-1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        assert_eq!(teller.store().loads.get(), 0);
    }

    #[test]
    fn transfer_to_unknown_account_is_not_found() {
        let mut teller = teller_with(&[(AccountType::Current, dec!(500.00))]);
        let err = teller.transfer(1, 9, dec!(1.00)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(teller.store().load_balance(1).unwrap(), dec!(500.00));
        assert!(teller.history(1).unwrap().is_empty());
    }

    #[test]
    fn failed_write_without_store_transactions_leaves_partial_transfer() {
        let mut teller = flaky_teller(&[dec!(500.00), dec!(100.00)]);
        teller.store.fail_save_for = Some(2);

        let err = teller.transfer(1, 2, dec!(200.00)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PersistenceFailure);
        assert!(matches!(
            err,
            ProcessError::StoreErr(StoreError::Unavailable(_))
        ));

        // source already debited, destination not credited, no records
        let store = teller.into_store();
        assert_eq!(store.inner.load_balance(1).unwrap(), dec!(300.00));
        assert_eq!(store.inner.load_balance(2).unwrap(), dec!(100.00));
        assert!(store.inner.list_transactions(1).unwrap().is_empty());
    }

    #[test]
    fn failed_write_with_store_transactions_leaves_nothing() {
        // the in-memory store groups writes, an unknown destination fails the
        // second save after the first one succeeded
        let mut teller = teller_with(&[(AccountType::Current, dec!(500.00))]);
        let err = teller
            .store
            .atomically(|store| {
                store.save_balance(1, dec!(300.00))?;
                store.save_balance(2, dec!(300.00))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(2)));
        assert_eq!(teller.store().load_balance(1).unwrap(), dec!(500.00));
    }

    #[test]
    fn deposit_and_withdraw() {
        let mut teller = teller_with(&[(AccountType::Current, dec!(0.00))]);
        assert_eq!(teller.deposit(1, dec!(150.25)).unwrap(), dec!(150.25));
        assert_eq!(teller.withdraw(1, dec!(50.25)).unwrap(), dec!(100.00));

        let err = teller.withdraw(1, dec!(100.01)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(teller.store().load_balance(1).unwrap(), dec!(100.00));

        let kinds: Vec<_> = teller
            .history(1)
            .unwrap()
            .iter()
            .map(|record| (record.kind, record.amount))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (TransactionKind::Withdraw, dec!(50.25)),
                (TransactionKind::Deposit, dec!(150.25)),
            ]
        );

        let err = teller.deposit(3, dec!(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn repeated_cent_deposits_stay_exact() {
        let mut teller = teller_with(&[(AccountType::Savings, dec!(0.00))]);
        for _ in 0..10_000 {
            teller.deposit(1, dec!(0.01)).unwrap();
        }
        assert_eq!(teller.store().load_balance(1).unwrap(), dec!(100.00));
    }

    #[test]
    fn interest_is_credited_to_savings_only() {
        let mut teller = teller_with(&[
            (AccountType::Savings, dec!(1000.00)),
            (AccountType::Current, dec!(1000.00)),
            (AccountType::Savings, dec!(0.00)),
        ]);

        let receipt = teller.accrue_interest(1).unwrap();
        assert_eq!(receipt.interest, dec!(20.00));
        assert_eq!(receipt.balance, dec!(1020.00));
        assert_eq!(teller.store().load_balance(1).unwrap(), dec!(1020.00));
        let history = teller.history(1).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::Interest);

        let err = teller.accrue_interest(2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InterestNotSupported);
        assert_eq!(teller.store().load_balance(2).unwrap(), dec!(1000.00));

        // nothing to credit, nothing recorded
        let receipt = teller.accrue_interest(3).unwrap();
        assert_eq!(receipt.interest, dec!(0));
        assert!(teller.history(3).unwrap().is_empty());
    }

    #[test]
    fn process_commands() {
        let mut teller = teller_with(&[
            (AccountType::Savings, dec!(500.00)),
            (AccountType::Current, dec!(100.00)),
        ]);
        let outcome = teller
            .process(Command::transfer(1, 2, dec!(200.00)).unwrap())
            .unwrap();
        assert!(matches!(outcome, Outcome::Transferred(_)));

        let outcome = teller
            .process(Command::deposit(2, dec!(0.50)).unwrap())
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Deposited {
                account_id: 2,
                amount: dec!(0.50),
                balance: dec!(300.50)
            }
        );

        // hand-built commands are validated again
        let err = teller
            .process(Command::Transfer(TransferCommand {
                from: 2,
                to: 2,
                amount: dec!(1),
            }))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransfer);
    }

    #[test]
    fn open_account_starts_empty() {
        let mut teller = teller_with(&[]);
        let id = teller
            .open_account(
                OpenAccountCommand::new(customer("Meera"), AccountType::Savings).unwrap(),
            )
            .unwrap();
        let accounts = teller.accounts().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].id, id);
        assert_eq!(accounts[0].holder, "Meera Shah");
        assert_eq!(accounts[0].balance, dec!(0.00));
    }
}
