//! # Sale Repository
//!
//! Database operations for sales.
//!
//! ## Recording a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    record(NewSale { sku, quantity, ... })               │
//! │                                                                         │
//! │  validate quantity                                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────── one transaction ───────────────┐                     │
//! │  │ 1. look up product by SKU     (NotFound)      │                     │
//! │  │ 2. check stock                (Insufficient)  │                     │
//! │  │ 3. decrement stock                            │                     │
//! │  │ 4. insert sale (price snapshot)               │                     │
//! │  └───────────────────────────────────────────────┘                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  any failure: stock and sales both unchanged                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use stockpile_core::validation::validate_quantity;
use stockpile_core::{CoreError, NewSale, Sale};
use tracing::{debug, info};

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::params;
use crate::repository::product::fetch_by_sku;
use crate::repository::{enumerated, new_id, now_text, timestamp};
use crate::value::Row;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    db: Database,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(db: Database) -> Self {
        SaleRepository { db }
    }

    /// Records a sale and takes the units out of stock, atomically.
    ///
    /// ## Errors
    /// * `DbError::Domain` - Invalid quantity, or not enough stock
    /// * `DbError::NotFound` - Unknown SKU
    /// * `DbError::ForeignKeyViolation` - `sold_by` is not a user id
    pub async fn record(&self, new_sale: &NewSale) -> DbResult<Sale> {
        validate_quantity(new_sale.quantity)?;
        let new_sale = new_sale.clone();

        let sale = self
            .db
            .transaction(|tx| async move {
                let product = fetch_by_sku(&tx, &new_sale.sku)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", new_sale.sku.as_str()))?;

                if !product.can_sell(new_sale.quantity) {
                    return Err(CoreError::InsufficientStock {
                        sku: product.sku,
                        available: product.quantity,
                        requested: new_sale.quantity,
                    }
                    .into());
                }

                let now = now_text();
                tx.execute(
                    "UPDATE products SET quantity = quantity - ?1, updated_at = ?2 WHERE id = ?3",
                    &params![new_sale.quantity, now.as_str(), product.id.as_str()],
                )
                .await?;

                let id = new_id();
                let total = product.price * new_sale.quantity as f64;
                debug!(id = %id, sku = %product.sku, quantity = new_sale.quantity, "Inserting sale");

                tx.execute(
                    r#"
                    INSERT INTO sales (
                        id, product_id, quantity, unit_price, total, payment_mode,
                        sold_by, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                    &params![
                        id.as_str(),
                        product.id.as_str(),
                        new_sale.quantity,
                        product.price,
                        total,
                        new_sale.payment_mode.as_str(),
                        new_sale.sold_by.as_deref(),
                        now.as_str()
                    ],
                )
                .await?;

                let row = tx
                    .query_one("SELECT * FROM sales WHERE id = ?1", &params![id.as_str()])
                    .await?
                    .ok_or_else(|| DbError::not_found("Sale", id.as_str()))?;
                sale_from_row(&row)
            })
            .await?;

        info!(id = %sale.id, total = sale.total, "Sale recorded");
        Ok(sale)
    }

    /// Most recent sales first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let rows = self
            .db
            .query_many(
                "SELECT * FROM sales ORDER BY created_at DESC, rowid DESC LIMIT ?1",
                &params![limit],
            )
            .await?;

        rows.iter().map(sale_from_row).collect()
    }

    /// Sum of all sale totals.
    pub async fn revenue_total(&self) -> DbResult<f64> {
        let row = self
            .db
            .query_one("SELECT COALESCE(SUM(total), 0.0) AS revenue FROM sales", &[])
            .await?;

        match row {
            Some(row) => row.f64("revenue"),
            None => Ok(0.0),
        }
    }
}

fn sale_from_row(row: &Row) -> DbResult<Sale> {
    Ok(Sale {
        id: row.text("id")?,
        product_id: row.text("product_id")?,
        quantity: row.i64("quantity")?,
        unit_price: row.f64("unit_price")?,
        total: row.f64("total")?,
        payment_mode: enumerated(row, "payment_mode")?,
        sold_by: row.opt_text("sold_by")?,
        created_at: timestamp(row, "created_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
