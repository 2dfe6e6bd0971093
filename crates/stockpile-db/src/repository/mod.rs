//! # Repository Module
//!
//! Repository implementations for Stockpile, built on the query facade.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Route handler                                                         │
//! │       │                                                                 │
//! │       │  db.sales().record(&new_sale)                                  │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── record(&self, sale)        ─► db.transaction(...)                 │
//! │  ├── list_recent(&self, limit)  ─► db.query_many(...)                  │
//! │  └── revenue_total(&self)       ─► db.query_one(...)                   │
//! │       │                                                                 │
//! │       │  Row ──► decode ──► Sale                                        │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalogue and stock levels
//! - [`SaleRepository`](sale::SaleRepository) - Sales and revenue
//! - [`ExpenseRepository`](expense::ExpenseRepository) - Expenses by payment mode
//! - [`UserRepository`](user::UserRepository) - Accounts and login

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use stockpile_core::CoreError;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::value::Row;

pub mod expense;
pub mod product;
pub mod sale;
pub mod user;

/// New row id.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time in the stored format (matches the schema's column defaults).
pub(crate) fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Reads an RFC 3339 timestamp column.
pub(crate) fn timestamp(row: &Row, column: &str) -> DbResult<DateTime<Utc>> {
    let text = row.text(column)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::Decode(format!("column '{}': {}", column, e)))
}

/// Reads a TEXT column into one of the core enumerations.
pub(crate) fn enumerated<T>(row: &Row, column: &str) -> DbResult<T>
where
    T: FromStr<Err = CoreError>,
{
    Ok(row.text(column)?.parse()?)
}
