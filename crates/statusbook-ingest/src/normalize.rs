//! Row normalization
//!
//! Turns one raw CSV row into the persisted document of a record type. A row
//! missing any required column, or holding an empty value in one, is rejected
//! and simply left out of the load.

use csv::StringRecord;
use serde::Serialize;
use statusbook_common::models::{status_columns, to_document, user_columns};
use statusbook_common::{Document, Status, StoreError, User};
use std::collections::HashMap;

/// One input row: column name → raw value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    values: HashMap<String, String>,
}

impl RawRow {
    /// Pair a CSV record with its header row; surplus or missing fields are ignored
    pub fn from_record(headers: &StringRecord, record: &StringRecord) -> Self {
        let values = headers
            .iter()
            .zip(record.iter())
            .map(|(column, value)| (column.trim().to_string(), value.to_string()))
            .collect();
        Self { values }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.values.get(column).map(String::as_str)
    }

    /// True if the column is present and non-empty
    pub fn has_value(&self, column: &str) -> bool {
        self.get(column).is_some_and(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// A record type that can be loaded from a CSV file
pub trait RowRecord: Serialize + Sized + Send + 'static {
    /// Short name used in logs and on the command line
    const KIND: &'static str;

    /// Columns that must be present and non-empty
    const REQUIRED_COLUMNS: &'static [&'static str];

    /// Build the record from a row that passed validation
    fn from_valid_row(row: &RawRow) -> Self;
}

impl RowRecord for User {
    const KIND: &'static str = "users";
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        user_columns::USER_ID,
        user_columns::EMAIL,
        user_columns::NAME,
        user_columns::LASTNAME,
    ];

    fn from_valid_row(row: &RawRow) -> Self {
        let field = |column| row.get(column).unwrap_or_default();
        User::new(
            field(user_columns::USER_ID),
            field(user_columns::EMAIL),
            field(user_columns::NAME),
            field(user_columns::LASTNAME),
        )
    }
}

impl RowRecord for Status {
    const KIND: &'static str = "statuses";
    // Status text is free-form and may legitimately be empty
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &[status_columns::STATUS_ID, status_columns::USER_ID];

    fn from_valid_row(row: &RawRow) -> Self {
        let field = |column| row.get(column).unwrap_or_default();
        Status::new(
            field(status_columns::STATUS_ID),
            field(status_columns::USER_ID),
            field(status_columns::STATUS_TEXT),
        )
    }
}

/// Normalize a row, or `None` if it is rejected
pub fn normalize<R: RowRecord>(row: &RawRow) -> Option<R> {
    R::REQUIRED_COLUMNS
        .iter()
        .all(|column| row.has_value(column))
        .then(|| R::from_valid_row(row))
}

/// Normalize a row straight into a store document
pub fn normalize_document<R: RowRecord>(row: &RawRow) -> Result<Option<Document>, StoreError> {
    normalize::<R>(row).map(|record| to_document(&record)).transpose()
}

/// Required columns absent from a header row
pub fn missing_columns<R: RowRecord>(headers: &StringRecord) -> Vec<&'static str> {
    R::REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|required| !headers.iter().any(|h| h.trim() == *required))
        .collect()
}
