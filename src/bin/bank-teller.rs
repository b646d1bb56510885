use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use bank_teller::{
    account::{AccountId, AccountType},
    bin_utils::{
        RowError, Service,
        config::{Config, DatabaseLocation},
        csv_printer::{print_accounts, print_history},
    },
    command::{Command, Customer, OpenAccountCommand, parse_amount},
    processor::{ProcessError, TransactionProcessor, teller::Teller},
    store::{LedgerStore, in_memory_store::InMemoryStore, sqlite_store::SqliteStore},
};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bank-teller", version, about = "Customer accounts, deposits and transfers")]
struct Cli {
    /// SQLite database file, `:memory:` for a throwaway store (overrides BANK_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Open an account for a new customer
    Open {
        first_name: String,
        last_name: String,
        email: String,
        phone: String,
        /// `savings` or `current`
        #[arg(long = "type", default_value = "savings")]
        account_type: String,
    },
    /// Open accounts for every row of a customer CSV file
    ImportCustomers { file: PathBuf },
    Deposit { account: AccountId, amount: String },
    Withdraw { account: AccountId, amount: String },
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: String,
    },
    /// Credit interest to a savings account
    Interest { account: AccountId },
    /// List all accounts as CSV
    Accounts,
    /// List the transactions of one account as CSV, most recent first
    History { account: AccountId },
    /// Apply an operation CSV file (`type,account,to,amount`)
    Batch { file: PathBuf },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "bank_teller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let database = cli
        .database
        .as_deref()
        .map_or(config.database, DatabaseLocation::parse);

    match database {
        DatabaseLocation::InMemory => {
            let mut teller = Teller::new(InMemoryStore::default(), config.savings_interest);
            run(&mut teller, cli.action)
        }
        DatabaseLocation::File(path) => {
            let store = SqliteStore::open(&path)
                .with_context(|| format!("Failed to open database `{}`", path.display()))?;
            let mut teller = Teller::new(store, config.savings_interest);
            run(&mut teller, cli.action)
        }
    }
}

fn run<S: LedgerStore>(teller: &mut Teller<S>, action: Action) -> Result<()> {
    match action {
        Action::Open {
            first_name,
            last_name,
            email,
            phone,
            account_type,
        } => {
            let account_type: AccountType = account_type.parse()?;
            let command = OpenAccountCommand::new(
                Customer {
                    first_name,
                    last_name,
                    email,
                    phone,
                },
                account_type,
            )
            .map_err(|err| report(ProcessError::from(err)))?;
            let account_id = teller.open_account(command).map_err(report)?;
            println!("Opened {account_type} account {account_id}");
            Ok(())
        }
        Action::ImportCustomers { file } => {
            let mut stdout = io::stdout();
            let service = Service {
                input: open(&file)?,
                output: &mut stdout,
                teller,
                error_printer: Box::new(print_row_error),
            };
            service.import_customers()?;
            Ok(())
        }
        Action::Deposit { account, amount } => {
            let command = parse_amount(&amount)
                .and_then(|amount| Command::deposit(account, amount))
                .map_err(|err| report(err.into()))?;
            execute(teller, command)
        }
        Action::Withdraw { account, amount } => {
            let command = parse_amount(&amount)
                .and_then(|amount| Command::withdraw(account, amount))
                .map_err(|err| report(err.into()))?;
            execute(teller, command)
        }
        Action::Transfer { from, to, amount } => {
            let command = parse_amount(&amount)
                .and_then(|amount| Command::transfer(from, to, amount))
                .map_err(|err| report(err.into()))?;
            execute(teller, command)
        }
        Action::Interest { account } => {
            execute(teller, Command::AccrueInterest { account_id: account })
        }
        Action::Accounts => {
            let accounts = teller.accounts().map_err(report)?;
            print_accounts(&mut io::stdout(), accounts.into_iter())
        }
        Action::History { account } => {
            let records = teller.history(account).map_err(report)?;
            print_history(&mut io::stdout(), records.into_iter())
        }
        Action::Batch { file } => {
            let mut stdout = io::stdout();
            let service = Service {
                input: open(&file)?,
                output: &mut stdout,
                teller,
                error_printer: Box::new(print_row_error),
            };
            let summary = service.run_operations()?;
            if summary.rejected > 0 {
                eprintln!(
                    "{} of {} operations rejected",
                    summary.rejected,
                    summary.processed + summary.rejected
                );
            }
            Ok(())
        }
    }
}

fn execute<S: LedgerStore>(teller: &mut Teller<S>, command: Command) -> Result<()> {
    let outcome = teller.process(command).map_err(report)?;
    println!("{outcome}");
    Ok(())
}

fn open(file: &Path) -> Result<File> {
    File::open(file).with_context(|| format!("Failed to open `{}`", file.display()))
}

/// Keeps the failure kind in front of the message, e.g. `insufficient funds: ...`.
fn report(err: ProcessError) -> anyhow::Error {
    anyhow!("{}: {err}", err.kind())
}

fn print_row_error(line: u64, err: RowError) {
    eprintln!("Error at line {line}: {err}")
}
