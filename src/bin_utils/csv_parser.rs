use std::{io::Read, marker::PhantomData};

use csv::{StringRecord, StringRecordsIntoIter, Trim};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{account::AccountId, command::OperationKind};

/// Row of an operation batch: `type,account,to,amount`.
#[derive(Debug, Deserialize)]
pub struct OperationRow {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub account: AccountId,
    pub to: Option<AccountId>,
    /// Kept as text so it is parsed straight into an exact decimal.
    pub amount: Option<String>,
}

/// Row of a customer import: `first_name,last_name,email,phone,account_type`.
#[derive(Debug, Deserialize)]
pub struct CustomerRow {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub account_type: Option<String>,
}

/// Parses CSV rows into `T`, yielding each row with its line number.
///
/// Malformed rows come out as errors, parsing continues with the next row.
pub struct CsvRecordParser<R, T> {
    headers: StringRecord,
    records: StringRecordsIntoIter<R>,
    _row: PhantomData<T>,
}

impl<R, T> CsvRecordParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    pub fn new(source: R) -> csv::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .from_reader(source);
        let headers = reader.headers()?.clone();

        Ok(Self {
            headers,
            records: reader.into_records(),
            _row: PhantomData,
        })
    }
}

impl<R, T> Iterator for CsvRecordParser<R, T>
where
    R: Read,
    T: DeserializeOwned,
{
    type Item = (u64, csv::Result<T>);

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next().map(|record| match record {
            Ok(record) => {
                let line = record.position().map_or(0, |pos| pos.line());
                (line, record.deserialize(Some(&self.headers)))
            }
            Err(err) => {
                let line = err.position().map_or(0, |pos| pos.line());
                (line, Err(err))
            }
        })
    }
}
