//! # Domain Types
//!
//! Core domain types used throughout Stockpile.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    Expense      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  id             │   │  id             │       │
//! │  │  sku (natural)  │◄──│  product_id(FK) │   │  category       │       │
//! │  │  price (REAL)   │   │  total (REAL)   │   │  amount (REAL)  │       │
//! │  │  quantity       │   │  payment_mode   │   │  payment_mode   │       │
//! │  └─────────────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │                                 │ sold_by             │ recorded_by    │
//! │                                 ▼                     ▼                │
//! │                        ┌─────────────────┐   ┌─────────────────┐       │
//! │                        │      User       │   │  Role / Payment │       │
//! │                        │  id, username   │   │  Mode (TEXT in  │       │
//! │                        │  role           │   │  a CHECK set)   │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Monetary Values
//! Prices, costs, totals and expense amounts are `f64`. The database stores
//! them as `REAL`; the inventory app only ever displays and sums them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Role
// =============================================================================

/// Account role. Stored as TEXT constrained to [`Role::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including user management.
    Admin,
    /// Day-to-day sales and expense entry.
    Staff,
}

impl Role {
    /// Every allowed role, in schema order.
    pub const ALL: [Role; 2] = [Role::Admin, Role::Staff];

    /// The stored text form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "role",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Payment Mode
// =============================================================================

/// How a sale was paid or an expense was settled.
/// Stored as TEXT constrained to [`PaymentMode::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Card,
    Upi,
    BankTransfer,
}

impl PaymentMode {
    /// Every allowed payment mode, in schema order.
    pub const ALL: [PaymentMode; 4] = [
        PaymentMode::Cash,
        PaymentMode::Card,
        PaymentMode::Upi,
        PaymentMode::BankTransfer,
    ];

    /// The stored text form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Cash => "cash",
            PaymentMode::Card => "card",
            PaymentMode::Upi => "upi",
            PaymentMode::BankTransfer => "bank_transfer",
        }
    }
}

impl Default for PaymentMode {
    fn default() -> Self {
        PaymentMode::Cash
    }
}

impl fmt::Display for PaymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| CoreError::UnknownVariant {
                kind: "payment mode",
                value: s.to_string(),
            })
    }
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Row identifier.
    pub id: String,

    /// Stock Keeping Unit - natural key, unique.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Optional grouping shown in the product list.
    pub category: Option<String>,

    /// Selling price per unit.
    pub price: f64,

    /// Purchase cost per unit.
    pub cost: f64,

    /// Units on hand.
    pub quantity: i64,

    /// Quantity at or below which the product is reported as low stock.
    pub reorder_level: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Checks if the product has enough units on hand for a sale.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.quantity >= quantity
    }

    /// Checks if the product is at or below its reorder level.
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub price: f64,
    pub cost: f64,
    pub quantity: i64,
    pub reorder_level: i64,
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded sale of one product line.
///
/// `unit_price` is a snapshot of the product price at the time of sale, so
/// later price changes don't rewrite history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub total: f64,
    pub payment_mode: PaymentMode,
    pub sold_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for recording a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewSale {
    pub sku: String,
    pub quantity: i64,
    pub payment_mode: PaymentMode,
    pub sold_by: Option<String>,
}

// =============================================================================
// Expense
// =============================================================================

/// A business expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub category: String,
    pub description: Option<String>,
    pub amount: f64,
    pub payment_mode: PaymentMode,
    pub recorded_by: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for recording an expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewExpense {
    pub category: String,
    pub description: Option<String>,
    pub amount: f64,
    pub payment_mode: PaymentMode,
    pub recorded_by: Option<String>,
}

// =============================================================================
// User
// =============================================================================

/// An application account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,

    /// PHC-format hash. Never serialized to the frontend.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,

    pub role: Role,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
