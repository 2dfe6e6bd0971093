//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Classified by sqlx ErrorKind                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Route handler maps to an HTTP status                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Taxonomy
//! | Kind                    | Variant(s)                                   |
//! |-------------------------|----------------------------------------------|
//! | Initialization failure  | `InitializationFailed` (shared, terminal)    |
//! | Execution failure       | `UniqueViolation`, `CheckViolation`, ...     |
//! | Misuse                  | `NestedTransaction`, `TransactionClosed`,    |
//! |                         | `OutsideTransactionScope`                    |
//!
//! `DbError` is `Clone` because one failed initialization is handed to every
//! caller that was waiting on it.

use stockpile_core::CoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Database operation errors.
#[derive(Debug, Clone, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - Repository lookup by id or SKU finds nothing where a row is required
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU or username without `OR IGNORE`
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Recording a sale for a product id that doesn't exist
    /// - Deleting a product that sales still reference
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation.
    ///
    /// ## When This Occurs
    /// - A role or payment mode outside its allowed set
    /// - A negative price, quantity or amount
    #[error("Check constraint violation: {message}")]
    CheckViolation { message: String },

    /// NOT NULL constraint violation.
    #[error("Missing required value: {message}")]
    NotNullViolation { message: String },

    /// Opening the database failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created (permissions, missing directory)
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// First-time setup (connect + bootstrap) failed.
    ///
    /// Terminal for the `Database` it happened on: every later caller gets
    /// the same error.
    #[error("Database initialization failed: {0}")]
    InitializationFailed(#[source] Box<DbError>),

    /// Invalid environment configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Statement execution failed for a reason not classified above.
    ///
    /// ## When This Occurs
    /// - SQL syntax error
    /// - Missing table or column
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// BEGIN or a non-benign COMMIT failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// `transaction()` was called while a transaction body was running.
    #[error("Nested transactions are not supported")]
    NestedTransaction,

    /// The shared facade was used from inside a transaction body on the
    /// same task. That statement would wait forever on the handle the body
    /// is holding; use the scoped facade instead.
    #[error("Statement issued outside the open transaction scope; use the scope passed to the body")]
    OutsideTransactionScope,

    /// A transaction scope was used after it committed or rolled back.
    #[error("Transaction scope is already closed")]
    TransactionClosed,

    /// A column could not be read as the expected type.
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Domain rule violation (validation, insufficient stock, hashing).
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a Decode error for a column.
    pub fn decode(column: &str, expected: &str) -> Self {
        DbError::Decode(format!("column '{}' is not {}", column, expected))
    }

    /// The error behind an initialization failure, or `self`.
    pub fn root_cause(&self) -> &DbError {
        match self {
            DbError::InitializationFailed(inner) => inner.root_cause(),
            other => other,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → by ErrorKind (unique / fk / check / not null)
/// sqlx::Error::Io             → DbError::ConnectionFailed
/// decode / column errors      → DbError::Decode
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match err {
            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                match db_err.kind() {
                    ErrorKind::UniqueViolation => {
                        // "UNIQUE constraint failed: products.sku"
                        let field = msg
                            .split("UNIQUE constraint failed: ")
                            .nth(1)
                            .unwrap_or("unknown")
                            .to_string();
                        DbError::UniqueViolation {
                            field,
                            value: "unknown".to_string(),
                        }
                    }
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message: msg },
                    ErrorKind::CheckViolation => DbError::CheckViolation { message: msg },
                    ErrorKind::NotNullViolation => DbError::NotNullViolation { message: msg },
                    _ => DbError::QueryFailed(msg),
                }
            }

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            sqlx::Error::Configuration(e) => DbError::Configuration(e.to_string()),

            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnIndexOutOfBounds { .. } => DbError::Decode(err.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<ConfigError> for DbError {
    fn from(err: ConfigError) -> Self {
        DbError::Configuration(err.to_string())
    }
}

impl From<stockpile_core::ValidationError> for DbError {
    fn from(err: stockpile_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
