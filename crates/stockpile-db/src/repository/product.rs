//! # Product Repository
//!
//! Database operations for the product catalogue.
//!
//! ## Key Operations
//! - Listing and SKU lookup
//! - Inserts with validation
//! - Stock adjustments that never go below zero
//! - Low-stock report
//!
//! ## Stock Adjustment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    adjust_stock("SKU005", -3)                           │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    SELECT ... WHERE sku = 'SKU005'      ─► not found? NotFound         │
//! │    4 + (-3) = 1                          ─► below 0? InsufficientStock │
//! │    UPDATE products SET quantity = 1                                    │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use stockpile_core::validation::{validate_new_product, validate_sku};
use stockpile_core::{CoreError, NewProduct, Product, ValidationError};
use tracing::{debug, info};

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::params;
use crate::repository::{new_id, now_text, timestamp};
use crate::transaction::TxScope;
use crate::value::Row;

const PRODUCT_COLUMNS: &str = r#"
    id, sku, name, category, price, cost, quantity, reorder_level,
    created_at, updated_at
"#;

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_by_sku("SKU001").await?;
/// let restocked = repo.adjust_stock("SKU001", 50).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    db: Database,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(db: Database) -> Self {
        ProductRepository { db }
    }

    /// Lists every product, by name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let sql = format!("SELECT {} FROM products ORDER BY name", PRODUCT_COLUMNS);
        let rows = self.db.query_many(&sql, &[]).await?;

        rows.iter().map(product_from_row).collect()
    }

    /// Gets a product by SKU.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - No product with that SKU
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE sku = ?1", PRODUCT_COLUMNS);
        let row = self.db.query_one(&sql, &params![sku]).await?;

        row.as_ref().map(product_from_row).transpose()
    }

    /// Inserts a new product.
    ///
    /// ## Errors
    /// * `DbError::Domain` - Input fails validation
    /// * `DbError::UniqueViolation` - SKU already exists
    pub async fn insert(&self, product: &NewProduct) -> DbResult<Product> {
        validate_new_product(product)?;

        let id = new_id();
        let now = now_text();

        debug!(id = %id, sku = %product.sku, "Inserting product");

        self.db
            .execute(
                r#"
                INSERT INTO products (
                    id, sku, name, category, price, cost, quantity, reorder_level,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                &params![
                    id.as_str(),
                    product.sku.as_str(),
                    product.name.as_str(),
                    product.category.as_deref(),
                    product.price,
                    product.cost,
                    product.quantity,
                    product.reorder_level,
                    now.as_str(),
                    now.as_str()
                ],
            )
            .await?;

        self.get_by_sku(&product.sku)
            .await?
            .ok_or_else(|| DbError::not_found("Product", product.sku.as_str()))
    }

    /// Adds `delta` units (negative to remove) and returns the updated product.
    ///
    /// ## Errors
    /// * `DbError::NotFound` - Unknown SKU
    /// * `CoreError::InsufficientStock` - Result would be negative
    /// * `ValidationError::OutOfRange` - Result would not fit in an `i64`
    pub async fn adjust_stock(&self, sku: &str, delta: i64) -> DbResult<Product> {
        validate_sku(sku)?;
        let sku = sku.to_string();

        let product = self
            .db
            .transaction(|tx| async move {
                let product = fetch_by_sku(&tx, &sku)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", sku.as_str()))?;

                let new_quantity = product.quantity.checked_add(delta).ok_or_else(|| {
                    ValidationError::OutOfRange {
                        field: "quantity".to_string(),
                        min: 0,
                        max: i64::MAX,
                    }
                })?;
                if new_quantity < 0 {
                    return Err(CoreError::InsufficientStock {
                        sku: sku.clone(),
                        available: product.quantity,
                        requested: delta.saturating_neg(),
                    }
                    .into());
                }

                tx.execute(
                    "UPDATE products SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
                    &params![new_quantity, now_text(), product.id.as_str()],
                )
                .await?;

                fetch_by_sku(&tx, &sku)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", sku.as_str()))
            })
            .await?;

        info!(sku = %product.sku, delta, quantity = product.quantity, "Stock adjusted");
        Ok(product)
    }

    /// Deletes a product by SKU. Returns false if there was none.
    ///
    /// Products with recorded sales can't be deleted
    /// (`DbError::ForeignKeyViolation`).
    pub async fn delete(&self, sku: &str) -> DbResult<bool> {
        let removed = self
            .db
            .execute_counted("DELETE FROM products WHERE sku = ?1", &params![sku])
            .await?;

        debug!(sku = %sku, removed, "Deleted product");
        Ok(removed > 0)
    }

    /// Products at or below their reorder level, emptiest first.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE quantity <= reorder_level ORDER BY quantity, sku",
            PRODUCT_COLUMNS
        );
        let rows = self.db.query_many(&sql, &[]).await?;

        rows.iter().map(product_from_row).collect()
    }
}

/// SKU lookup inside an open transaction.
pub(crate) async fn fetch_by_sku(tx: &TxScope, sku: &str) -> DbResult<Option<Product>> {
    let sql = format!("SELECT {} FROM products WHERE sku = ?1", PRODUCT_COLUMNS);
    let row = tx.query_one(&sql, &params![sku]).await?;

    row.as_ref().map(product_from_row).transpose()
}

pub(crate) fn product_from_row(row: &Row) -> DbResult<Product> {
    Ok(Product {
        id: row.text("id")?,
        sku: row.text("sku")?,
        name: row.text("name")?,
        category: row.opt_text("category")?,
        price: row.f64("price")?,
        cost: row.f64("cost")?,
        quantity: row.i64("quantity")?,
        reorder_level: row.i64("reorder_level")?,
        created_at: timestamp(row, "created_at")?,
        updated_at: timestamp(row, "updated_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
