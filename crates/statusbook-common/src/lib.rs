//! Statusbook Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared models, error types, and logging setup for the statusbook workspace.
//!
//! # Overview
//!
//! - **Models**: the persisted [`User`](models::User) and [`Status`](models::Status)
//!   document shapes and the CSV column names they are loaded from
//! - **Error Handling**: [`StoreError`] for document store failures and
//!   [`StatusbookError`] for everything above the store
//! - **Logging**: `tracing` subscriber configuration shared by every binary
//!
//! # Example
//!
//! ```
//! use statusbook_common::models::User;
//!
//! let user = User::new("SC", "sesame@uw.edu", "Sesame", "Chan");
//! let doc = statusbook_common::models::to_document(&user).unwrap();
//! assert_eq!(doc["_id"], "SC");
//! ```

pub mod error;
pub mod logging;
pub mod models;

// Re-export commonly used types
pub use error::{Result, StatusbookError, StoreError};
pub use models::{Document, Status, User};
