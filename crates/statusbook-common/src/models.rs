//! Persisted document shapes
//!
//! Both record types are stored as JSON objects keyed by `_id`. The CSV column
//! names each record is loaded from live next to its model.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// A stored document: a JSON object with a string `_id`
pub type Document = Map<String, Value>;

/// Primary key field of every document
pub const ID_FIELD: &str = "_id";

/// CSV columns of the user accounts file
pub mod user_columns {
    pub const USER_ID: &str = "USER_ID";
    pub const EMAIL: &str = "EMAIL";
    pub const NAME: &str = "NAME";
    pub const LASTNAME: &str = "LASTNAME";
}

/// CSV columns of the status updates file
pub mod status_columns {
    pub const STATUS_ID: &str = "STATUS_ID";
    pub const USER_ID: &str = "USER_ID";
    pub const STATUS_TEXT: &str = "STATUS_TEXT";
}

/// A user account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub user_email: String,
    pub user_name: String,
    pub user_last_name: String,
}

impl User {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_email: email.into(),
            user_name: name.into(),
            user_last_name: last_name.into(),
        }
    }
}

/// A status message owned by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(rename = "_id")]
    pub status_id: String,
    pub user_id: String,
    pub status_text: String,
}

impl Status {
    pub fn new(
        status_id: impl Into<String>,
        user_id: impl Into<String>,
        status_text: impl Into<String>,
    ) -> Self {
        Self {
            status_id: status_id.into(),
            user_id: user_id.into(),
            status_text: status_text.into(),
        }
    }
}

/// Serialize a record into a store document
pub fn to_document<T: Serialize>(record: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

/// Deserialize a store document into a record
pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// The string `_id` of a document, if present
pub fn document_id(doc: &Document) -> Option<&str> {
    doc.get(ID_FIELD).and_then(Value::as_str)
}
