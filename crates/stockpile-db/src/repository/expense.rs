//! # Expense Repository
//!
//! Database operations for business expenses.

use stockpile_core::validation::validate_new_expense;
use stockpile_core::{Expense, NewExpense, PaymentMode};
use tracing::debug;

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::params;
use crate::repository::{enumerated, new_id, now_text, timestamp};
use crate::value::Row;

/// Repository for expense database operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    db: Database,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(db: Database) -> Self {
        ExpenseRepository { db }
    }

    /// Records an expense.
    pub async fn insert(&self, expense: &NewExpense) -> DbResult<Expense> {
        validate_new_expense(expense)?;

        let id = new_id();
        debug!(id = %id, category = %expense.category, amount = expense.amount, "Inserting expense");

        self.db
            .execute(
                r#"
                INSERT INTO expenses (
                    id, category, description, amount, payment_mode, recorded_by, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                &params![
                    id.as_str(),
                    expense.category.trim(),
                    expense.description.as_deref(),
                    expense.amount,
                    expense.payment_mode.as_str(),
                    expense.recorded_by.as_deref(),
                    now_text()
                ],
            )
            .await?;

        let row = self
            .db
            .query_one("SELECT * FROM expenses WHERE id = ?1", &params![id.as_str()])
            .await?
            .ok_or_else(|| DbError::not_found("Expense", id.as_str()))?;

        expense_from_row(&row)
    }

    /// All expenses, newest first.
    pub async fn list(&self) -> DbResult<Vec<Expense>> {
        let rows = self
            .db
            .query_many(
                "SELECT * FROM expenses ORDER BY created_at DESC, rowid DESC",
                &[],
            )
            .await?;

        rows.iter().map(expense_from_row).collect()
    }

    /// Total spent per payment mode. Modes with no expenses are left out.
    pub async fn total_by_payment_mode(&self) -> DbResult<Vec<(PaymentMode, f64)>> {
        let rows = self
            .db
            .query_many(
                r#"
                SELECT payment_mode, SUM(amount) AS total
                FROM expenses
                GROUP BY payment_mode
                ORDER BY payment_mode
                "#,
                &[],
            )
            .await?;

        rows.iter()
            .map(|row| -> DbResult<(PaymentMode, f64)> {
                Ok((enumerated(row, "payment_mode")?, row.f64("total")?))
            })
            .collect()
    }
}

fn expense_from_row(row: &Row) -> DbResult<Expense> {
    Ok(Expense {
        id: row.text("id")?,
        category: row.text("category")?,
        description: row.opt_text("description")?,
        amount: row.f64("amount")?,
        payment_mode: enumerated(row, "payment_mode")?,
        recorded_by: row.opt_text("recorded_by")?,
        created_at: timestamp(row, "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;
    use stockpile_core::{CoreError, ADMIN_USER_ID};

    fn expense(category: &str, amount: f64, payment_mode: PaymentMode) -> NewExpense {
        NewExpense {
            category: category.to_string(),
            description: None,
            amount,
            payment_mode,
            recorded_by: Some(ADMIN_USER_ID.to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = test_db();
        let repo = db.expenses();

        let inserted = repo
            .insert(&expense("Utilities", 120.0, PaymentMode::Card))
            .await
            .unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], inserted);
        assert_eq!(all[1].category, "Rent");
    }

    #[tokio::test]
    async fn test_invalid_amount_is_rejected() {
        let db = test_db();

        let err = db
            .expenses()
            .insert(&expense("Utilities", f64::NAN, PaymentMode::Cash))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_total_by_payment_mode() {
        let db = test_db();
        let repo = db.expenses();
        repo.insert(&expense("Supplies", 30.0, PaymentMode::Cash))
            .await
            .unwrap();
        repo.insert(&expense("Snacks", 12.5, PaymentMode::Cash))
            .await
            .unwrap();

        let totals = repo.total_by_payment_mode().await.unwrap();

        assert_eq!(
            totals,
            vec![(PaymentMode::BankTransfer, 450.0), (PaymentMode::Cash, 42.5)]
        );
    }
}
