//! # Transaction Coordinator
//!
//! Runs a caller-supplied body inside one BEGIN ... COMMIT/ROLLBACK scope.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Transaction Scope                                  │
//! │                                                                         │
//! │  in a body already? ──yes──► NestedTransactionRejected (body not run)  │
//! │        │ no                                                             │
//! │        ▼                                                                │
//! │  lock client handle ──► BEGIN ──► body(TxScope)                        │
//! │                                      │                                  │
//! │                    ┌─────────────────┴─────────────────┐                │
//! │                    ▼ Ok(value)                         ▼ Err(e)         │
//! │                 COMMIT                              ROLLBACK            │
//! │           ┌────────┼──────────────┐                (failure logged,     │
//! │           ▼        ▼              ▼                 e returned)         │
//! │      Committed  "no transaction  other failure                          │
//! │                 is active"       ──► ROLLBACK ──► RolledBack(failure)   │
//! │                 ──► CommittedAfterExternalResolution                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The handle stays locked from BEGIN until the scope is resolved, so
//! autonomous statements and other scopes queue behind it.
//!
//! ## Nesting
//! A task-local marker is set while a body runs. `transaction()` and the
//! shared facade both check it; neither would make progress otherwise,
//! since the body's task already holds the handle they'd wait on.
//! Work spawned onto other tasks does not inherit the marker.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{self, Client, ClientGuard, ConnectionManager};
use crate::database::{fetch_first, fetch_rows, run_statement};
use crate::error::{DbError, DbResult};
use crate::value::{Row, Value};

tokio::task_local! {
    static ACTIVE_SCOPE: ();
}

/// True while the current task is running a transaction body.
pub(crate) fn in_transaction() -> bool {
    ACTIVE_SCOPE.try_with(|_| ()).is_ok()
}

// =============================================================================
// Outcome
// =============================================================================

/// How a transaction scope ended.
#[derive(Debug)]
pub enum TxOutcome<T> {
    /// Body succeeded and COMMIT succeeded.
    Committed(T),

    /// Body succeeded, but by COMMIT time the engine had no open
    /// transaction (the body issued its own COMMIT or ROLLBACK). Treated as
    /// success.
    CommittedAfterExternalResolution(T),

    /// Body failed, or COMMIT failed for any other reason. Holds that error,
    /// never a rollback error.
    RolledBack(DbError),

    /// Requested from inside another transaction body. Nothing ran.
    NestedTransactionRejected,
}

impl<T> TxOutcome<T> {
    /// Success outcomes give the body's value; the rest become errors.
    pub fn into_result(self) -> DbResult<T> {
        match self {
            TxOutcome::Committed(value) | TxOutcome::CommittedAfterExternalResolution(value) => {
                Ok(value)
            }
            TxOutcome::RolledBack(err) => Err(err),
            TxOutcome::NestedTransactionRejected => Err(DbError::NestedTransaction),
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(
            self,
            TxOutcome::Committed(_) | TxOutcome::CommittedAfterExternalResolution(_)
        )
    }
}

/// State of a [`TxScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Open,
    Committed,
    RolledBack,
}

// =============================================================================
// Scope
// =============================================================================

struct ScopeInner {
    /// Held from BEGIN until resolution; `None` afterwards.
    guard: Option<ClientGuard>,
    state: TxState,
}

impl ScopeInner {
    fn open_client(&mut self) -> DbResult<&mut Client> {
        match (self.state, self.guard.as_mut()) {
            (TxState::Open, Some(guard)) => Ok(&mut **guard),
            _ => Err(DbError::TransactionClosed),
        }
    }
}

/// Statement facade bound to one open transaction.
///
/// Handed to the body by value; clones share the same scope. Once the
/// scope resolves, every method returns `DbError::TransactionClosed`.
#[derive(Clone)]
pub struct TxScope {
    inner: Arc<Mutex<ScopeInner>>,
}

impl std::fmt::Debug for TxScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxScope").finish_non_exhaustive()
    }
}

impl TxScope {
    fn open(guard: ClientGuard) -> Self {
        TxScope {
            inner: Arc::new(Mutex::new(ScopeInner {
                guard: Some(guard),
                state: TxState::Open,
            })),
        }
    }

    /// Runs a statement in this transaction and returns every row.
    pub async fn query_many(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let mut inner = self.inner.lock().await;
        let client = inner.open_client()?;
        fetch_rows(&mut client.conn, sql, params).await
    }

    /// Runs a statement in this transaction and returns the first row.
    pub async fn query_one(&self, sql: &str, params: &[Value]) -> DbResult<Option<Row>> {
        let mut inner = self.inner.lock().await;
        let client = inner.open_client()?;
        fetch_first(&mut client.conn, sql, params).await
    }

    /// Runs a statement in this transaction for its effect.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<()> {
        self.execute_counted(sql, params).await.map(|_| ())
    }

    /// Like [`TxScope::execute`], returning the number of rows changed.
    pub async fn execute_counted(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let mut inner = self.inner.lock().await;
        let client = inner.open_client()?;
        run_statement(&mut client.conn, sql, params).await
    }

    /// Always fails with `DbError::NestedTransaction`; `body` is never run.
    pub async fn transaction<T, F, Fut>(&self, body: F) -> DbResult<T>
    where
        F: FnOnce(TxScope) -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        drop(body);
        warn!("Rejected nested transaction");
        Err(DbError::NestedTransaction)
    }

    pub async fn state(&self) -> TxState {
        self.inner.lock().await.state
    }

    /// Commits after a successful body, rolls back after a failed one.
    async fn resolve<T>(&self, result: DbResult<T>) -> TxOutcome<T> {
        let mut inner = self.inner.lock().await;

        let mut guard = match inner.guard.take() {
            Some(guard) => guard,
            None => return TxOutcome::RolledBack(DbError::TransactionClosed),
        };

        let outcome = match result {
            Ok(value) => match sqlx::query("COMMIT").execute(&mut guard.conn).await {
                Ok(_) => {
                    guard.open_scope = false;
                    debug!("Transaction committed");
                    TxOutcome::Committed(value)
                }
                Err(e) if is_no_active_transaction(&e) => {
                    guard.open_scope = false;
                    info!("Commit found no active transaction; treating as committed");
                    TxOutcome::CommittedAfterExternalResolution(value)
                }
                Err(e) => {
                    let err = DbError::from(e);
                    warn!(error = %err, "Commit failed; rolling back");
                    rollback_quietly(&mut guard).await;
                    TxOutcome::RolledBack(err)
                }
            },
            Err(err) => {
                debug!(error = %err, "Transaction body failed; rolling back");
                rollback_quietly(&mut guard).await;
                TxOutcome::RolledBack(err)
            }
        };

        inner.state = if outcome.is_committed() {
            TxState::Committed
        } else {
            TxState::RolledBack
        };
        outcome
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Opens a scope on the manager's handle, runs `body` in it, and resolves it.
pub(crate) async fn run<T, F, Fut>(manager: &ConnectionManager, body: F) -> DbResult<TxOutcome<T>>
where
    F: FnOnce(TxScope) -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    if in_transaction() {
        warn!("Rejected nested transaction");
        return Ok(TxOutcome::NestedTransactionRejected);
    }

    let handle = manager.client().await?;
    let mut guard = client::acquire(&handle).await;

    sqlx::query("BEGIN")
        .execute(&mut guard.conn)
        .await
        .map_err(|e| DbError::TransactionFailed(DbError::from(e).to_string()))?;
    guard.open_scope = true;
    debug!("Transaction opened");

    let scope = TxScope::open(guard);
    let body_scope = scope.clone();
    let result = ACTIVE_SCOPE
        .scope((), async move { body(body_scope).await })
        .await;

    Ok(scope.resolve(result).await)
}

/// Rolls back, logging instead of returning any failure.
///
/// If the failure wasn't "no transaction is active" the marker stays set,
/// and the next acquirer of the handle retries the rollback.
async fn rollback_quietly(guard: &mut ClientGuard) {
    match sqlx::query("ROLLBACK").execute(&mut guard.conn).await {
        Ok(_) => {
            guard.open_scope = false;
            debug!("Transaction rolled back");
        }
        Err(e) if is_no_active_transaction(&e) => {
            guard.open_scope = false;
            debug!("Rollback found no active transaction");
        }
        Err(e) => {
            warn!(error = %e, "Rollback failed; suppressed in favour of the original error");
        }
    }
}

/// Recognizes SQLite's "cannot commit/rollback - no transaction is active".
///
/// SQLite reports this under the generic SQLITE_ERROR code (1), so the
/// message is what tells it apart.
fn is_no_active_transaction(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("1")
                && db_err.message().contains("no transaction is active")
        }
        _ => false,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use crate::test_support::test_db;
    use crate::Database;
    use std::sync::atomic::{AtomicBool, Ordering};

    async fn stock_of(db: &Database, sku: &str) -> i64 {
        db.query_one("SELECT quantity FROM products WHERE sku = ?1", &params![sku])
            .await
            .unwrap()
            .unwrap()
            .i64("quantity")
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_persists_every_statement() {
        let db = test_db();

        let value = db
            .transaction(|tx| async move {
                tx.execute("UPDATE products SET quantity = 150 WHERE sku = ?1", &params!["SKU001"])
                    .await?;
                tx.execute("UPDATE products SET quantity = 60 WHERE sku = ?1", &params!["SKU002"])
                    .await?;
                Ok(42)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(stock_of(&db, "SKU001").await, 150);
        assert_eq!(stock_of(&db, "SKU002").await, 60);
    }

    #[tokio::test]
    async fn test_body_error_rolls_back_and_is_returned() {
        let db = test_db();

        let err = db
            .transaction(|tx| async move {
                tx.execute("UPDATE products SET quantity = 0 WHERE sku = ?1", &params!["SKU001"])
                    .await?;
                Err::<(), _>(DbError::not_found("Product", "SKU999"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { ref id, .. } if id == "SKU999"));
        assert_eq!(stock_of(&db, "SKU001").await, 200);
    }

    #[tokio::test]
    async fn test_statement_error_inside_body_rolls_back() {
        let db = test_db();

        let outcome = db
            .transaction_outcome(|tx| async move {
                tx.execute("UPDATE products SET quantity = 1 WHERE sku = ?1", &params!["SKU003"])
                    .await?;
                tx.execute(
                    "UPDATE products SET quantity = -5 WHERE sku = ?1",
                    &params!["SKU004"],
                )
                .await?;
                Ok(())
            })
            .await
            .unwrap();

        assert!(matches!(outcome, TxOutcome::RolledBack(DbError::CheckViolation { .. })));
        assert_eq!(stock_of(&db, "SKU003").await, 35);
    }

    #[tokio::test]
    async fn test_nested_transaction_is_rejected_without_running() {
        let db = test_db();
        let inner_ran = Arc::new(AtomicBool::new(false));

        let flag = inner_ran.clone();
        let inner_db = db.clone();
        let outcome = db
            .transaction_outcome(|_tx| async move {
                let nested = inner_db
                    .transaction_outcome(|_inner| async move {
                        flag.store(true, Ordering::SeqCst);
                        Ok(())
                    })
                    .await?;
                Ok(matches!(nested, TxOutcome::NestedTransactionRejected))
            })
            .await
            .unwrap();

        assert!(matches!(outcome, TxOutcome::Committed(true)));
        assert!(!inner_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_nested_rejection_surfaces_as_error() {
        let db = test_db();
        let inner_db = db.clone();

        let err = db
            .transaction(|tx| async move {
                tx.execute("UPDATE products SET quantity = 1 WHERE sku = ?1", &params!["SKU001"])
                    .await?;
                inner_db.transaction(|_inner| async move { Ok(()) }).await
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NestedTransaction));
        assert_eq!(stock_of(&db, "SKU001").await, 200);
    }

    #[tokio::test]
    async fn test_scope_transaction_is_rejected() {
        let db = test_db();

        let err = db
            .transaction(|tx| async move {
                tx.transaction(|_inner| async move { Ok(()) }).await
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NestedTransaction));
    }

    #[tokio::test]
    async fn test_shared_facade_inside_body_is_rejected() {
        let db = test_db();
        let inner_db = db.clone();

        let err = db
            .transaction(|_tx| async move {
                inner_db.query_one("SELECT 1", &[]).await?;
                Ok(())
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::OutsideTransactionScope));
    }

    #[tokio::test]
    async fn test_commit_after_body_rollback_is_benign() {
        let db = test_db();

        let outcome = db
            .transaction_outcome(|tx| async move {
                tx.execute("UPDATE products SET quantity = 1 WHERE sku = ?1", &params!["SKU001"])
                    .await?;
                tx.execute("ROLLBACK", &[]).await?;
                Ok("done")
            })
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            TxOutcome::CommittedAfterExternalResolution("done")
        ));
        assert_eq!(stock_of(&db, "SKU001").await, 200);

        // The handle is usable afterwards.
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_commit_after_body_commit_is_benign() {
        let db = test_db();

        let value = db
            .transaction(|tx| async move {
                tx.execute("UPDATE products SET quantity = 7 WHERE sku = ?1", &params!["SKU002"])
                    .await?;
                tx.execute("COMMIT", &[]).await?;
                Ok(1)
            })
            .await
            .unwrap();

        assert_eq!(value, 1);
        assert_eq!(stock_of(&db, "SKU002").await, 7);
    }

    #[tokio::test]
    async fn test_rollback_failure_does_not_mask_body_error() {
        let db = test_db();

        let err = db
            .transaction(|tx| async move {
                tx.execute("ROLLBACK", &[]).await?;
                Err::<(), _>(DbError::Internal("body failed".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::Internal(ref msg) if msg == "body failed"));
        assert!(db.health_check().await);
    }

    #[tokio::test]
    async fn test_failed_commit_propagates_and_rolls_back() {
        let db = test_db();

        let outcome = db
            .transaction_outcome(|tx| async move {
                tx.execute("PRAGMA defer_foreign_keys = ON", &[]).await?;
                tx.execute(
                    "INSERT INTO sales (id, product_id, quantity, unit_price, total) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    &params!["sale-orphan", "prod-missing", 1_i64, 1.0, 1.0],
                )
                .await?;
                Ok(())
            })
            .await
            .unwrap();

        match outcome {
            TxOutcome::RolledBack(err) => {
                assert!(err.to_string().contains("FOREIGN KEY constraint failed"))
            }
            other => panic!("expected rollback, got {:?}", other),
        }

        let orphan = db
            .query_one("SELECT id FROM sales WHERE id = ?1", &params!["sale-orphan"])
            .await
            .unwrap();
        assert!(orphan.is_none());
    }

    #[tokio::test]
    async fn test_scope_is_closed_after_resolution() {
        let db = test_db();

        let leaked = db.transaction(|tx| async move { Ok(tx) }).await.unwrap();

        assert_eq!(leaked.state().await, TxState::Committed);
        let err = leaked.query_one("SELECT 1", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::TransactionClosed));
    }

    #[tokio::test]
    async fn test_body_reads_its_own_writes() {
        let db = test_db();

        let seen = db
            .transaction(|tx| async move {
                tx.execute("UPDATE products SET quantity = 3 WHERE sku = ?1", &params!["SKU001"])
                    .await?;
                let row = tx
                    .query_one("SELECT quantity FROM products WHERE sku = ?1", &params!["SKU001"])
                    .await?;
                Ok(row.map(|r| r.i64("quantity")).transpose()?)
            })
            .await
            .unwrap();

        assert_eq!(seen, Some(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_scopes_never_interleave() {
        let db = test_db();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.transaction(|tx| async move {
                        let row = tx
                            .query_one(
                                "SELECT quantity FROM products WHERE sku = ?1",
                                &params!["SKU002"],
                            )
                            .await?;
                        let current = row.map(|r| r.i64("quantity")).transpose()?.unwrap_or(0);
                        tokio::task::yield_now().await;
                        tx.execute(
                            "UPDATE products SET quantity = ?1 WHERE sku = ?2",
                            &params![current - 1, "SKU002"],
                        )
                        .await
                    })
                    .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(stock_of(&db, "SKU002").await, 70);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_spawned_transaction_waits_for_enclosing_scope() {
        let db = test_db();
        let spawner = db.clone();

        let pending = db
            .transaction(|tx| async move {
                tx.execute("UPDATE products SET quantity = 100 WHERE sku = ?1", &params!["SKU001"])
                    .await?;

                let pending = tokio::spawn(async move {
                    spawner
                        .transaction(|inner| async move {
                            inner
                                .execute(
                                    "UPDATE products SET quantity = 5 WHERE sku = ?1",
                                    &params!["SKU001"],
                                )
                                .await
                        })
                        .await
                });
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;

                let row = tx
                    .query_one("SELECT quantity FROM products WHERE sku = ?1", &params!["SKU001"])
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", "SKU001"))?;
                assert_eq!(row.i64("quantity")?, 100);
                Ok(pending)
            })
            .await
            .unwrap();

        pending.await.unwrap().unwrap();
        assert_eq!(stock_of(&db, "SKU001").await, 5);
    }

    #[tokio::test]
    async fn test_inserted_row_is_absent_after_body_error() {
        let db = test_db();

        let err = db
            .transaction(|tx| async move {
                tx.execute(
                    "INSERT INTO products (id, sku, name, price, quantity) VALUES (?1, ?2, ?3, ?4, ?5)",
                    &params!["prod-ghost", "SKU666", "Ghost Item", 4.0, 1],
                )
                .await?;
                Err::<(), _>(DbError::TransactionFailed("register closed".to_string()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::TransactionFailed(ref msg) if msg == "register closed"));
        let row = db
            .query_one("SELECT * FROM products WHERE sku = ?1", &params!["SKU666"])
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_abandoned_scope_is_rolled_back_on_next_use() {
        let db = test_db();

        let handle = {
            let db = db.clone();
            tokio::spawn(async move {
                db.transaction(|tx| async move {
                    tx.execute("UPDATE products SET quantity = 0 WHERE sku = ?1", &params!["SKU001"])
                        .await?;
                    let crashed = true;
                    if crashed {
                        panic!("handler crashed mid-transaction");
                    }
                    Ok(())
                })
                .await
            })
        };
        assert!(handle.await.is_err());

        assert_eq!(stock_of(&db, "SKU001").await, 200);
    }
}
