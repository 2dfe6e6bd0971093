//! # Query Facade
//!
//! [`Database`] is what route handlers hold: three statement primitives,
//! one transactional primitive, and repository accessors.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Database (cheap Clone)                         │
//! │                                                                         │
//! │  query_many(sql, params) ─┐                                            │
//! │  query_one(sql, params)  ─┼──► ConnectionManager::client() ──► lock    │
//! │  execute(sql, params)    ─┘         (awaits initialization)   handle   │
//! │                                                                 │       │
//! │  transaction(body) ──► lock handle for the whole scope ◄───────┘       │
//! │                                                                         │
//! │  products() / sales() / expenses() / users()  ──► repositories         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Providers
//! - [`Database::shared`] - the process-wide instance, configured from the
//!   environment on first demand
//! - [`Database::new`] - an isolated instance (tests use one in-memory store
//!   each)
//!
//! Neither touches the database until the first statement.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::client::{self, ConnectionManager};
use crate::config::DbConfig;
use crate::error::{DbError, DbResult};
use crate::repository::expense::ExpenseRepository;
use crate::repository::product::ProductRepository;
use crate::repository::sale::SaleRepository;
use crate::repository::user::UserRepository;
use crate::transaction::{self, TxOutcome, TxScope};
use crate::value::{bind_params, Row, Value};

static SHARED: OnceLock<Database> = OnceLock::new();

// =============================================================================
// Database
// =============================================================================

/// Handle to one lazily initialized store.
///
/// ## Usage in Route Handlers
/// ```rust,ignore
/// async fn low_stock(db: Database) -> Result<Json<Vec<Product>>, ApiError> {
///     Ok(Json(db.products().low_stock().await?))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    manager: Arc<ConnectionManager>,
}

impl Database {
    /// Creates an isolated database handle. No I/O happens here.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory());
    /// let rows = db.query_many("SELECT * FROM products", &[]).await?; // bootstraps
    /// ```
    pub fn new(config: DbConfig) -> Self {
        Database {
            manager: Arc::new(ConnectionManager::new(config)),
        }
    }

    /// Creates a handle and initializes it immediately.
    ///
    /// Surfaces connection and bootstrap errors at startup instead of on the
    /// first request.
    pub async fn connect(config: DbConfig) -> DbResult<Self> {
        let db = Database::new(config);
        db.manager.client().await?;
        Ok(db)
    }

    /// The process-wide database, configured from the environment.
    ///
    /// Configuration is read on the first call only; later calls return
    /// clones of the same handle.
    pub fn shared() -> DbResult<Database> {
        if let Some(db) = SHARED.get() {
            return Ok(db.clone());
        }

        let config = DbConfig::from_env()?;
        info!(?config, "Configuring shared database");
        Ok(SHARED.get_or_init(|| Database::new(config)).clone())
    }

    /// The configuration this handle was created with.
    pub fn config(&self) -> &DbConfig {
        self.manager.config()
    }

    // =========================================================================
    // Statement Primitives
    // =========================================================================

    /// Runs a statement and returns every row, in engine order.
    ///
    /// Zero rows is an empty `Vec`, not an error.
    pub async fn query_many(&self, sql: &str, params: &[Value]) -> DbResult<Vec<Row>> {
        let handle = self.autonomous_client().await?;
        let mut client = client::acquire(&handle).await;
        fetch_rows(&mut client.conn, sql, params).await
    }

    /// Runs a statement and returns the first row, or `None` if there is none.
    pub async fn query_one(&self, sql: &str, params: &[Value]) -> DbResult<Option<Row>> {
        let handle = self.autonomous_client().await?;
        let mut client = client::acquire(&handle).await;
        fetch_first(&mut client.conn, sql, params).await
    }

    /// Runs a statement for its effect. Errors still propagate.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> DbResult<()> {
        self.execute_counted(sql, params).await.map(|_| ())
    }

    /// Like [`Database::execute`], returning the number of rows changed.
    pub async fn execute_counted(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        let handle = self.autonomous_client().await?;
        let mut client = client::acquire(&handle).await;
        run_statement(&mut client.conn, sql, params).await
    }

    async fn autonomous_client(&self) -> DbResult<client::ClientHandle> {
        // The body of an open scope holds the handle; waiting on it here
        // would never finish.
        if transaction::in_transaction() {
            return Err(DbError::OutsideTransactionScope);
        }
        self.manager.client().await
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Runs `body` inside one transaction and returns its result.
    ///
    /// ## Semantics
    /// - Body `Ok` → COMMIT (a commit that finds the transaction already
    ///   resolved still counts as success)
    /// - Body `Err` → ROLLBACK, and the body's error is returned even if the
    ///   rollback itself fails
    /// - Called from inside another body → `DbError::NestedTransaction`
    ///
    /// ## Deadlocks
    /// Nesting is detected per task. A task spawned from inside a body is
    /// an ordinary caller: its statements and transactions wait until the
    /// enclosing scope resolves. Awaiting such a task from the body that
    /// spawned it therefore never completes.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let sale_id = db.transaction(|tx| async move {
    ///     tx.execute("UPDATE products SET quantity = quantity - ?1 WHERE id = ?2",
    ///                &params![qty, product_id]).await?;
    ///     tx.execute("INSERT INTO sales (...) VALUES (...)", &params![...]).await?;
    ///     Ok(sale_id)
    /// }).await?;
    /// ```
    pub async fn transaction<T, F, Fut>(&self, body: F) -> DbResult<T>
    where
        F: FnOnce(TxScope) -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        self.transaction_outcome(body).await?.into_result()
    }

    /// Like [`Database::transaction`], but reports how the scope ended.
    ///
    /// The outer `Err` means no scope was opened (initialization or BEGIN
    /// failed); everything after BEGIN is described by the [`TxOutcome`].
    pub async fn transaction_outcome<T, F, Fut>(&self, body: F) -> DbResult<TxOutcome<T>>
    where
        F: FnOnce(TxScope) -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        transaction::run(&self.manager, body).await
    }

    // =========================================================================
    // Repositories
    // =========================================================================

    /// Returns the product repository.
    pub fn products(&self) -> ProductRepository {
        ProductRepository::new(self.clone())
    }

    /// Returns the sale repository.
    pub fn sales(&self) -> SaleRepository {
        SaleRepository::new(self.clone())
    }

    /// Returns the expense repository.
    pub fn expenses(&self) -> ExpenseRepository {
        ExpenseRepository::new(self.clone())
    }

    /// Returns the user repository.
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.clone())
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Checks if the database answers a trivial query.
    pub async fn health_check(&self) -> bool {
        self.query_one("SELECT 1", &[]).await.is_ok()
    }

    /// True once first-time setup has finished, successfully or not.
    pub fn is_initialized(&self) -> bool {
        self.manager.is_initialized()
    }

    /// Completed schema bootstrap runs for this handle: 0 before first use,
    /// 1 afterwards.
    pub fn bootstrap_runs(&self) -> usize {
        self.manager.bootstrap_runs()
    }
}

// =============================================================================
// Statement Execution
// =============================================================================
// Shared by the autonomous facade above and by transaction scopes.

pub(crate) async fn fetch_rows(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
) -> DbResult<Vec<Row>> {
    debug!(sql = %sql.trim(), params = params.len(), "query_many");

    let rows = bind_params(sql, params).fetch_all(&mut *conn).await?;
    rows.iter().map(Row::try_from).collect()
}

pub(crate) async fn fetch_first(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
) -> DbResult<Option<Row>> {
    debug!(sql = %sql.trim(), params = params.len(), "query_one");

    let row = bind_params(sql, params).fetch_optional(&mut *conn).await?;
    row.as_ref().map(Row::try_from).transpose()
}

pub(crate) async fn run_statement(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[Value],
) -> DbResult<u64> {
    debug!(sql = %sql.trim(), params = params.len(), "execute");

    let result = bind_params(sql, params).execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;
    use crate::test_support::test_db;

    #[tokio::test]
    async fn test_nothing_happens_before_first_query() {
        let db = test_db();

        assert!(!db.is_initialized());
        assert_eq!(db.bootstrap_runs(), 0);

        assert!(db.health_check().await);
        assert!(db.is_initialized());
        assert_eq!(db.bootstrap_runs(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_callers_bootstrap_once() {
        let db = test_db();

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.query_one("SELECT COUNT(*) AS n FROM users", &[]).await
                })
            })
            .collect();

        for task in tasks {
            let row = task.await.unwrap().unwrap().unwrap();
            assert_eq!(row.i64("n").unwrap(), 1);
        }

        assert_eq!(db.bootstrap_runs(), 1);
    }

    // The only test that touches the process environment or the shared handle.
    #[tokio::test]
    async fn test_shared_returns_one_handle_per_process() {
        use crate::config::{ENV_ADMIN_PASSWORD, ENV_DB_MODE, ENV_DB_PATH, ENV_SEED};

        std::env::remove_var(ENV_DB_PATH);
        std::env::remove_var(ENV_ADMIN_PASSWORD);
        std::env::set_var(ENV_SEED, "false");

        std::env::set_var(ENV_DB_MODE, "floppy");
        let err = Database::shared().unwrap_err();
        assert!(matches!(err, DbError::Configuration(ref msg) if msg.contains(ENV_DB_MODE)));

        std::env::set_var(ENV_DB_MODE, "memory");
        let first = Database::shared().unwrap();
        let second = Database::shared().unwrap();
        assert!(Arc::ptr_eq(&first.manager, &second.manager));
        assert_eq!(first.bootstrap_runs(), 0);

        first
            .execute(
                "INSERT INTO products (id, sku, name, price, quantity) VALUES (?1, ?2, ?3, ?4, ?5)",
                &params!["prod-shared", "SKU777", "Shared Pen", 1.25, 3],
            )
            .await
            .unwrap();
        let row = second
            .query_one("SELECT name FROM products WHERE sku = ?1", &params!["SKU777"])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.text("name").unwrap(), "Shared Pen");
        assert_eq!(first.bootstrap_runs(), 1);
        assert_eq!(second.bootstrap_runs(), 1);
        assert!(!first.config().seed);
    }

    #[tokio::test]
    async fn test_query_one_returns_none_for_zero_rows() {
        let db = test_db();

        let row = db
            .query_one("SELECT * FROM products WHERE sku = ?1", &params!["NOPE"])
            .await
            .unwrap();

        assert!(row.is_none());
    }

    #[tokio::test]
    async fn test_query_many_returns_empty_vec_for_zero_rows() {
        let db = test_db();

        let rows = db
            .query_many("SELECT * FROM products WHERE price > ?1", &params![1_000_000.0])
            .await
            .unwrap();

        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_execute_then_query_one_sees_the_write() {
        let db = test_db();

        db.execute(
            "INSERT INTO products (id, sku, name, price) VALUES (?1, ?2, ?3, ?4)",
            &params!["p-new", "SKU100", "Highlighter", 1.25],
        )
        .await
        .unwrap();

        let row = db
            .query_one("SELECT name, price FROM products WHERE sku = ?1", &params!["SKU100"])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.text("name").unwrap(), "Highlighter");
        assert_eq!(row.f64("price").unwrap(), 1.25);
    }

    #[tokio::test]
    async fn test_insert_or_ignore_keeps_first_values() {
        let db = test_db();
        let sql = "INSERT OR IGNORE INTO products (id, sku, name, price) VALUES (?1, ?2, ?3, ?4)";

        db.execute("DELETE FROM sales", &[]).await.unwrap();
        db.execute("DELETE FROM products WHERE sku = 'SKU001'", &[])
            .await
            .unwrap();

        let first = db
            .execute_counted(sql, &params!["p-a", "SKU001", "First", 1.0])
            .await
            .unwrap();
        let second = db
            .execute_counted(sql, &params!["p-b", "SKU001", "Second", 2.0])
            .await
            .unwrap();

        assert_eq!((first, second), (1, 0));

        let rows = db
            .query_many("SELECT id, name FROM products WHERE sku = ?1", &params!["SKU001"])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("name").unwrap(), "First");
    }

    #[tokio::test]
    async fn test_execution_errors_propagate() {
        let db = test_db();

        let err = db.execute("INSERT INTO nowhere VALUES (1)", &[]).await.unwrap_err();
        assert!(matches!(err, DbError::QueryFailed(_)));

        let err = db
            .execute(
                "INSERT INTO products (id, sku, name, price) VALUES (?1, ?2, ?3, ?4)",
                &params!["p-dup", "SKU002", "Dup", 1.0],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "products.sku"));
    }

    #[tokio::test]
    async fn test_parameters_are_bound_not_interpolated() {
        let db = test_db();
        let hostile = "x'); DROP TABLE products; --";

        db.execute(
            "INSERT INTO products (id, sku, name, price) VALUES (?1, ?2, ?3, ?4)",
            &params!["p-evil", "SKU666", hostile, 1.0],
        )
        .await
        .unwrap();

        let row = db
            .query_one("SELECT name FROM products WHERE id = ?1", &params!["p-evil"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.text("name").unwrap(), hostile);
        assert!(db.query_one("SELECT COUNT(*) FROM products", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_row_values_keep_engine_types() {
        let db = test_db();

        let row = db
            .query_one(
                "SELECT 7 AS i, 2.5 AS r, 'txt' AS t, x'0102' AS b, NULL AS n",
                &[],
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(row.get("i"), Some(&Value::Integer(7)));
        assert_eq!(row.get("r"), Some(&Value::Real(2.5)));
        assert_eq!(row.get("t"), Some(&Value::Text("txt".to_string())));
        assert_eq!(row.get("b"), Some(&Value::Blob(vec![1, 2])));
        assert_eq!(row.get("n"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_file_backed_store_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockpile.db");

        let first = Database::connect(crate::test_support::test_config_for(DbConfig::file(&path)))
            .await
            .unwrap();
        first
            .execute(
                "INSERT INTO products (id, sku, name, price) VALUES (?1, ?2, ?3, ?4)",
                &params!["p-file", "SKU200", "Tape", 2.0],
            )
            .await
            .unwrap();

        let second = Database::new(crate::test_support::test_config_for(DbConfig::file(&path)));
        let row = second
            .query_one("SELECT name FROM products WHERE sku = ?1", &params!["SKU200"])
            .await
            .unwrap();
        assert!(row.is_some());
    }

    #[tokio::test]
    async fn test_failed_initialization_is_shared_and_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("stockpile.db");
        let db = Database::new(crate::test_support::test_config_for(DbConfig::file(path)));

        let first = db.health_check().await;
        let err = db.query_one("SELECT 1", &[]).await.unwrap_err();

        assert!(!first);
        assert!(matches!(err, DbError::InitializationFailed(_)));
        assert!(matches!(err.root_cause(), DbError::ConnectionFailed(_)));
        assert!(db.is_initialized());
        assert_eq!(db.bootstrap_runs(), 0);
    }
}
