use std::{env, path::PathBuf};

use thiserror::Error;

use crate::{account::InterestPolicy, command::parse_amount};

pub const DATABASE_PATH_VAR: &str = "BANK_DATABASE_PATH";
pub const SAVINGS_RATE_VAR: &str = "BANK_SAVINGS_RATE";

const DEFAULT_DATABASE_PATH: &str = "bank.db";
const DEFAULT_SAVINGS_RATE: &str = "0.02";
const IN_MEMORY: &str = ":memory:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value `{value}` for {name}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

impl DatabaseLocation {
    pub fn parse(value: &str) -> Self {
        if value == IN_MEMORY {
            DatabaseLocation::InMemory
        } else {
            DatabaseLocation::File(PathBuf::from(value))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseLocation,
    pub savings_interest: InterestPolicy,
}

impl Config {
    /// Reads `BANK_DATABASE_PATH` and `BANK_SAVINGS_RATE`, falling back to
    /// `bank.db` and `0.02`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = lookup(DATABASE_PATH_VAR)
            .filter(|path| !path.trim().is_empty())
            .map_or_else(
                || DatabaseLocation::parse(DEFAULT_DATABASE_PATH),
                |path| DatabaseLocation::parse(path.trim()),
            );

        let rate = lookup(SAVINGS_RATE_VAR).unwrap_or_else(|| DEFAULT_SAVINGS_RATE.to_string());
        let savings_interest = parse_amount(&rate)
            .ok()
            .and_then(|rate| InterestPolicy::new(rate).ok())
            .ok_or_else(|| ConfigError::InvalidValue {
                name: SAVINGS_RATE_VAR,
                value: rate.clone(),
            })?;

        Ok(Self {
            database,
            savings_interest,
        })
    }
}
