//! # stockpile-core: Domain Types for Stockpile
//!
//! This crate holds everything about the inventory domain that does not
//! touch I/O: entity types, the enumerated value sets the database
//! constrains columns to, input validation, and password hashing.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockpile Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Route handlers / UI (external)                     │   │
//! │  │    products page ─ sales page ─ expenses page ─ login           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                stockpile-db (Data-Access Layer)                 │   │
//! │  │     lazy client, bootstrap, query facade, transactions          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockpile-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌────────────┐                │   │
//! │  │   │   types   │  │ validation │  │  password  │                │   │
//! │  │   │  Product  │  │   rules    │  │  Argon2    │                │   │
//! │  │   │ Role, ... │  │   checks   │  │  hasher    │                │   │
//! │  │   └───────────┘  └────────────┘  └────────────┘                │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Expense, User, Role, PaymentMode)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//! - [`password`] - One-way password hashing
//!
//! ## Example Usage
//!
//! ```rust
//! use stockpile_core::{PaymentMode, Role};
//!
//! assert_eq!(Role::Admin.as_str(), "admin");
//! assert_eq!("upi".parse::<PaymentMode>().unwrap(), PaymentMode::Upi);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod password;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use password::{Argon2Hasher, PasswordHasher};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Fixed id of the administrative account created by the bootstrapper.
///
/// Seeding is keyed on this id, so re-running the bootstrapper never creates
/// a second admin.
pub const ADMIN_USER_ID: &str = "user-admin-0001";

/// Username of the seeded administrative account.
pub const ADMIN_USERNAME: &str = "admin";

/// Maximum quantity of a single product in one sale.
pub const MAX_SALE_QUANTITY: i64 = 10_000;
