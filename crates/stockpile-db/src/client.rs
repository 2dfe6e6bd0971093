//! # Connection Manager
//!
//! Produces and memoizes the one client handle a [`Database`] talks through.
//!
//! ## Initialization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    First-Use Initialization                             │
//! │                                                                         │
//! │  caller A ──┐                                                          │
//! │  caller B ──┼──► OnceCell::get_or_init ◄── initialization token        │
//! │  caller C ──┘          │                                                │
//! │                        │ exactly one caller runs:                       │
//! │                        ▼                                                │
//! │              connect ──► schema::bootstrap ──► Ok(handle) / Err(e)      │
//! │                        │                                                │
//! │                        ▼                                                │
//! │   every caller (A, B, C, and all later ones) sees the same outcome     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed initialization is stored like a successful one: the cell is not
//! reset, so the failure is terminal for this manager.
//!
//! ## Handle
//! The connection sits behind a FIFO `tokio::sync::Mutex`. Autonomous
//! statements hold it for one statement; a transaction scope holds it from
//! BEGIN to COMMIT/ROLLBACK, which is what keeps two scopes from ever being
//! open at once.
//!
//! [`Database`]: crate::Database

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sqlx::{ConnectOptions, SqliteConnection};
use tokio::sync::{Mutex, OnceCell, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::config::{DbConfig, DbTarget};
use crate::error::{DbError, DbResult};
use crate::schema::{self, SeedData};

// =============================================================================
// Client Handle
// =============================================================================

/// The live connection plus the marker of an unresolved transaction.
#[derive(Debug)]
pub(crate) struct Client {
    pub(crate) conn: SqliteConnection,

    /// Set by BEGIN, cleared by COMMIT/ROLLBACK. Still set when the handle
    /// is next acquired means a scope was abandoned mid-flight.
    pub(crate) open_scope: bool,
}

/// Shared, lockable client handle.
pub(crate) type ClientHandle = Arc<Mutex<Client>>;

/// Exclusive access to the client for one statement or one scope.
pub(crate) type ClientGuard = OwnedMutexGuard<Client>;

/// Locks the handle, first rolling back anything an abandoned scope left open.
///
/// A scope is abandoned when its body panics or its future is dropped before
/// the coordinator resolves it.
pub(crate) async fn acquire(handle: &ClientHandle) -> ClientGuard {
    let mut guard = Arc::clone(handle).lock_owned().await;

    if guard.open_scope {
        warn!("Rolling back transaction left open by an abandoned scope");
        if let Err(e) = sqlx::query("ROLLBACK").execute(&mut guard.conn).await {
            debug!(error = %e, "Rollback of abandoned scope failed");
        }
        guard.open_scope = false;
    }

    guard
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Lazily creates, bootstraps and memoizes the client handle.
#[derive(Debug)]
pub(crate) struct ConnectionManager {
    config: DbConfig,

    /// The initialization token: in flight, succeeded, or failed.
    cell: OnceCell<Result<ClientHandle, DbError>>,

    /// Completed bootstrap runs. Backs the exactly-once guarantee.
    bootstrap_runs: AtomicUsize,
}

impl ConnectionManager {
    pub(crate) fn new(config: DbConfig) -> Self {
        ConnectionManager {
            config,
            cell: OnceCell::new(),
            bootstrap_runs: AtomicUsize::new(0),
        }
    }

    pub(crate) fn config(&self) -> &DbConfig {
        &self.config
    }

    /// Returns the memoized handle, initializing it on first demand.
    ///
    /// Concurrent first callers all await the same initialization; only one
    /// of them runs it.
    pub(crate) async fn client(&self) -> DbResult<ClientHandle> {
        match self.cell.get_or_init(|| self.initialize()).await {
            Ok(handle) => Ok(Arc::clone(handle)),
            Err(e) => Err(e.clone()),
        }
    }

    /// True once initialization has finished (either way).
    pub(crate) fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    pub(crate) fn bootstrap_runs(&self) -> usize {
        self.bootstrap_runs.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<ClientHandle, DbError> {
        let target = match &self.config.target {
            DbTarget::Memory => ":memory:".to_string(),
            DbTarget::File(path) => path.display().to_string(),
        };
        info!(target = %target, "Initializing database client");

        match self.connect_and_bootstrap().await {
            Ok(handle) => {
                info!(target = %target, "Database client ready");
                Ok(handle)
            }
            Err(e) => {
                error!(target = %target, error = %e, "Database initialization failed");
                Err(DbError::InitializationFailed(Box::new(e)))
            }
        }
    }

    async fn connect_and_bootstrap(&self) -> DbResult<ClientHandle> {
        let mut conn = self
            .config
            .connect_options()
            .connect()
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        debug!("Connection opened");

        let seed = if self.config.seed {
            let admin_hash = self
                .config
                .password_hasher
                .hash(&self.config.admin_password)?;
            Some(SeedData::baseline(admin_hash))
        } else {
            None
        };

        let report = schema::bootstrap(&mut conn, seed.as_ref()).await?;
        self.bootstrap_runs.fetch_add(1, Ordering::SeqCst);

        info!(
            tables = report.tables,
            seeded_rows = report.seeded_rows,
            "Schema bootstrap complete"
        );

        Ok(Arc::new(Mutex::new(Client {
            conn,
            open_scope: false,
        })))
    }
}
