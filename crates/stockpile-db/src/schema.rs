//! # Schema Bootstrapper
//!
//! Creates the inventory tables and inserts baseline rows. Safe to run
//! against a store that is already provisioned.
//!
//! ## Bootstrap Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Bootstrap Sequence                                 │
//! │                                                                         │
//! │  1. CREATE TABLE IF NOT EXISTS  (referenced tables first)              │
//! │     users ──► products ──► sales (→ products, users)                   │
//! │                       └──► expenses (→ users)                          │
//! │                                                                         │
//! │  2. CREATE INDEX IF NOT EXISTS                                         │
//! │                                                                         │
//! │  3. INSERT OR IGNORE seed rows, one transaction, same order            │
//! │     admin user (fixed id) ──► products (fixed SKUs)                    │
//! │       ──► sample sale ──► sample expense                               │
//! │                                                                         │
//! │  Re-running: tables exist (no-op), seed keys exist (ignored).          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Column Types
//! - Money is `REAL`
//! - Ids and enumerations are `TEXT`; `role` and `payment_mode` carry a
//!   `CHECK (... IN (...))` so out-of-set values fail in SQLite itself
//! - Timestamps are RFC 3339 `TEXT`

use sqlx::SqliteConnection;
use stockpile_core::{PaymentMode, Role, ADMIN_USERNAME, ADMIN_USER_ID};
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::params;
use crate::value::bind_params;

// =============================================================================
// DDL
// =============================================================================

/// Table names, in dependency order.
pub const TABLE_NAMES: &[&str] = &["users", "products", "sales", "expenses"];

/// Table definitions, in dependency order.
pub const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id            TEXT PRIMARY KEY NOT NULL,
        username      TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role          TEXT NOT NULL DEFAULT 'staff'
                      CHECK (role IN ('admin', 'staff')),
        created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id            TEXT PRIMARY KEY NOT NULL,
        sku           TEXT NOT NULL UNIQUE,
        name          TEXT NOT NULL,
        category      TEXT,
        price         REAL NOT NULL CHECK (price >= 0),
        cost          REAL NOT NULL DEFAULT 0 CHECK (cost >= 0),
        quantity      INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
        reorder_level INTEGER NOT NULL DEFAULT 0 CHECK (reorder_level >= 0),
        created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now')),
        updated_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sales (
        id            TEXT PRIMARY KEY NOT NULL,
        product_id    TEXT NOT NULL REFERENCES products(id),
        quantity      INTEGER NOT NULL CHECK (quantity > 0),
        unit_price    REAL NOT NULL CHECK (unit_price >= 0),
        total         REAL NOT NULL CHECK (total >= 0),
        payment_mode  TEXT NOT NULL DEFAULT 'cash'
                      CHECK (payment_mode IN ('cash', 'card', 'upi', 'bank_transfer')),
        sold_by       TEXT REFERENCES users(id),
        created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS expenses (
        id            TEXT PRIMARY KEY NOT NULL,
        category      TEXT NOT NULL,
        description   TEXT,
        amount        REAL NOT NULL CHECK (amount >= 0),
        payment_mode  TEXT NOT NULL DEFAULT 'cash'
                      CHECK (payment_mode IN ('cash', 'card', 'upi', 'bank_transfer')),
        recorded_by   TEXT REFERENCES users(id),
        created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
    )
    "#,
];

/// Secondary indexes for the list/report queries.
pub const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_sales_product_id ON sales(product_id)",
    "CREATE INDEX IF NOT EXISTS idx_sales_created_at ON sales(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_expenses_created_at ON expenses(created_at)",
];

// =============================================================================
// Seed Data
// =============================================================================

struct SeedProduct {
    id: &'static str,
    sku: &'static str,
    name: &'static str,
    category: &'static str,
    price: f64,
    cost: f64,
    quantity: i64,
    reorder_level: i64,
}

/// Baseline catalogue. Keyed on the fixed ids and SKUs.
const SEED_PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        id: "prod-0001",
        sku: "SKU001",
        name: "Ballpoint Pen (Blue)",
        category: "Stationery",
        price: 1.5,
        cost: 0.6,
        quantity: 200,
        reorder_level: 40,
    },
    SeedProduct {
        id: "prod-0002",
        sku: "SKU002",
        name: "A4 Notebook",
        category: "Stationery",
        price: 3.25,
        cost: 1.8,
        quantity: 80,
        reorder_level: 20,
    },
    SeedProduct {
        id: "prod-0003",
        sku: "SKU003",
        name: "USB-C Cable 1m",
        category: "Electronics",
        price: 9.99,
        cost: 4.2,
        quantity: 35,
        reorder_level: 10,
    },
    SeedProduct {
        id: "prod-0004",
        sku: "SKU004",
        name: "Desk Lamp",
        category: "Home",
        price: 24.0,
        cost: 13.5,
        quantity: 12,
        reorder_level: 5,
    },
    SeedProduct {
        id: "prod-0005",
        sku: "SKU005",
        name: "Stapler",
        category: "Stationery",
        price: 6.75,
        cost: 3.1,
        quantity: 4,
        reorder_level: 5,
    },
];

pub const SEED_SALE_ID: &str = "sale-seed-0001";
pub const SEED_EXPENSE_ID: &str = "expense-seed-0001";

/// Per-run seed input. The admin hash comes from the configured hasher, so
/// it can't be a constant.
#[derive(Debug, Clone)]
pub struct SeedData {
    pub admin_password_hash: String,
}

impl SeedData {
    /// The standard seed set with the given admin password hash.
    pub fn baseline(admin_password_hash: impl Into<String>) -> Self {
        SeedData {
            admin_password_hash: admin_password_hash.into(),
        }
    }
}

/// What one bootstrap run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Tables ensured.
    pub tables: usize,
    /// Seed rows actually inserted (0 on a re-run).
    pub seeded_rows: u64,
}

// =============================================================================
// Bootstrap
// =============================================================================

/// Ensures tables, indexes and (optionally) seed rows exist.
///
/// ## Safety
/// - Idempotent: `IF NOT EXISTS` + `INSERT OR IGNORE`
/// - Seed rows go in one transaction; a failure leaves no partial seed
pub async fn bootstrap(
    conn: &mut SqliteConnection,
    seed: Option<&SeedData>,
) -> DbResult<BootstrapReport> {
    for ddl in TABLES.iter().chain(INDEXES) {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    debug!(tables = TABLES.len(), indexes = INDEXES.len(), "Schema ensured");

    let seeded_rows = match seed {
        Some(seed) => insert_seed(conn, seed).await?,
        None => 0,
    };

    Ok(BootstrapReport {
        tables: TABLES.len(),
        seeded_rows,
    })
}

async fn insert_seed(conn: &mut SqliteConnection, seed: &SeedData) -> DbResult<u64> {
    sqlx::query("BEGIN").execute(&mut *conn).await?;

    match insert_seed_rows(conn, seed).await {
        Ok(inserted) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            debug!(inserted, "Seed rows applied");
            Ok(inserted)
        }
        Err(e) => {
            if let Err(rollback_err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                warn!(error = %rollback_err, "Seed rollback failed");
            }
            Err(e)
        }
    }
}

async fn insert_seed_rows(conn: &mut SqliteConnection, seed: &SeedData) -> DbResult<u64> {
    let mut inserted = 0;

    inserted += bind_params(
        "INSERT OR IGNORE INTO users (id, username, password_hash, role) VALUES (?1, ?2, ?3, ?4)",
        &params![
            ADMIN_USER_ID,
            ADMIN_USERNAME,
            seed.admin_password_hash.as_str(),
            Role::Admin.as_str()
        ],
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    for product in SEED_PRODUCTS {
        inserted += bind_params(
            r#"
            INSERT OR IGNORE INTO products (
                id, sku, name, category, price, cost, quantity, reorder_level
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            &params![
                product.id,
                product.sku,
                product.name,
                product.category,
                product.price,
                product.cost,
                product.quantity,
                product.reorder_level
            ],
        )
        .execute(&mut *conn)
        .await?
        .rows_affected();
    }

    // References prod-0001 and the admin, both inserted above.
    inserted += bind_params(
        r#"
        INSERT OR IGNORE INTO sales (
            id, product_id, quantity, unit_price, total, payment_mode, sold_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        &params![
            SEED_SALE_ID,
            SEED_PRODUCTS[0].id,
            2_i64,
            SEED_PRODUCTS[0].price,
            SEED_PRODUCTS[0].price * 2.0,
            PaymentMode::Cash.as_str(),
            ADMIN_USER_ID
        ],
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    inserted += bind_params(
        r#"
        INSERT OR IGNORE INTO expenses (
            id, category, description, amount, payment_mode, recorded_by
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        &params![
            SEED_EXPENSE_ID,
            "Rent",
            "Opening month shop rent",
            450.0,
            PaymentMode::BankTransfer.as_str(),
            ADMIN_USER_ID
        ],
    )
    .execute(&mut *conn)
    .await?
    .rows_affected();

    Ok(inserted)
}

// =============================================================================
// Unit Tests
// =============================================================================
