/// Account balance rules: deposit, withdrawal and interest accrual on exact
/// decimal amounts. Values live only for the duration of one operation.
pub mod account;

/// Operator input parsed into validated commands that are later executed by
/// [`processor`].
pub mod command;

/// Balance and ledger persistence interface, plus "in memory" and SQLite
/// implementations.
pub mod store;

/// Teller coordinating single-account operations and transfers over a
/// [`store::LedgerStore`].
pub mod processor;

/// Configuration and CSV batch handling for the binary. It lives here rather
/// than in the binary so integration tests can drive it.
pub mod bin_utils;
