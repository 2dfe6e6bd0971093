//! # stockpile-db: Data-Access Layer for Stockpile
//!
//! Every database operation the inventory app performs goes through this
//! crate. It owns one SQLite connection, created and bootstrapped on first
//! use, and exposes it through a small query facade plus a transactional
//! primitive.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockpile Data Flow                              │
//! │                                                                         │
//! │  Route handler (products page, sales page, login, ...)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  stockpile-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │    Schema    │   │   │
//! │  │   │ (database.rs) │    │ (product.rs)  │    │ (schema.rs)  │   │   │
//! │  │   │               │    │               │    │              │   │   │
//! │  │   │ query_many    │◄───│ ProductRepo   │    │ tables       │   │   │
//! │  │   │ query_one     │    │ SaleRepo      │    │ seed rows    │   │   │
//! │  │   │ execute       │    │ ExpenseRepo   │    │ (run once)   │   │   │
//! │  │   │ transaction   │    │ UserRepo      │    │              │   │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────▲───────┘   │   │
//! │  │           │                                        │           │   │
//! │  │   ┌───────▼────────────────────────────────────────┴───────┐   │   │
//! │  │   │  ConnectionManager (client.rs): lazy, memoized handle  │   │   │
//! │  │   └────────────────────────────────────────────────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite: ./stockpile.db (file mode) or :memory: (memory mode)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Storage target and first-use behaviour
//! - [`database`] - The query facade
//! - [`transaction`] - Transaction scopes and outcomes
//! - [`schema`] - Tables, indexes and seed rows
//! - [`value`] - Parameter and row types
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, sale, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockpile_db::{params, Database};
//!
//! let db = Database::shared()?;
//!
//! // First statement connects and bootstraps
//! let rows = db
//!     .query_many("SELECT * FROM products WHERE quantity <= ?1", &params![10])
//!     .await?;
//!
//! // Or through a repository
//! let low = db.products().low_stock().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod repository;
pub mod schema;
pub mod transaction;
pub mod value;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, DbConfig, DbTarget};
pub use database::Database;
pub use error::{DbError, DbResult};
pub use schema::BootstrapReport;
pub use transaction::{TxOutcome, TxScope, TxState};
pub use value::{Row, Value};

// Repository re-exports for convenience
pub use repository::expense::ExpenseRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
pub use repository::user::UserRepository;

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use stockpile_core::error::CoreResult;
    use stockpile_core::PasswordHasher;

    use crate::{Database, DbConfig};

    /// Reversible stand-in for Argon2, which is slow in debug builds.
    #[derive(Debug, Default)]
    pub(crate) struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash(&self, password: &str) -> CoreResult<String> {
            Ok(format!("plain${}", password))
        }

        fn verify(&self, password: &str, hash: &str) -> bool {
            hash.strip_prefix("plain$") == Some(password)
        }
    }

    pub(crate) fn test_config_for(config: DbConfig) -> DbConfig {
        config.password_hasher(Arc::new(PlainHasher))
    }

    /// A fresh, seeded, in-memory database. Nothing is opened until first use.
    pub(crate) fn test_db() -> Database {
        Database::new(test_config_for(DbConfig::in_memory()))
    }
}
