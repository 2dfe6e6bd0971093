//! # Database Configuration
//!
//! Where the store lives and how first-time setup behaves.
//!
//! ## Environment
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Variable                   Default           Meaning                  │
//! │  ─────────────────────────  ────────────────  ───────────────────────  │
//! │  STOCKPILE_DB_MODE          file              memory | file            │
//! │  STOCKPILE_DB_PATH          ./stockpile.db    file target (file mode)  │
//! │  STOCKPILE_SEED             true              insert baseline rows     │
//! │  STOCKPILE_ADMIN_PASSWORD   admin123          seeded admin password    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The mode must be decided before the first connection; after that the
//! client handle is fixed for the life of the `Database`.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use stockpile_core::{Argon2Hasher, PasswordHasher};

pub const ENV_DB_MODE: &str = "STOCKPILE_DB_MODE";
pub const ENV_DB_PATH: &str = "STOCKPILE_DB_PATH";
pub const ENV_SEED: &str = "STOCKPILE_SEED";
pub const ENV_ADMIN_PASSWORD: &str = "STOCKPILE_ADMIN_PASSWORD";

const DEFAULT_DB_PATH: &str = "./stockpile.db";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

// =============================================================================
// Target
// =============================================================================

/// Storage target selected by the deployment mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    /// Private in-memory database, gone when the process exits.
    Memory,
    /// File-backed database, created if missing.
    File(PathBuf),
}

// =============================================================================
// Configuration
// =============================================================================

/// Database configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::file("./data/stockpile.db")
///     .busy_timeout(Duration::from_secs(10))
///     .seed(false);
/// ```
#[derive(Clone)]
pub struct DbConfig {
    /// In-memory or file-backed store.
    pub target: DbTarget,

    /// How long SQLite waits on a locked file before failing a statement.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Whether the bootstrapper inserts baseline rows.
    /// Default: true
    pub seed: bool,

    /// Plain-text password hashed into the seeded admin account.
    pub admin_password: String,

    /// Hasher used for the admin seed and for new users.
    pub password_hasher: Arc<dyn PasswordHasher>,
}

impl DbConfig {
    fn with_target(target: DbTarget) -> Self {
        DbConfig {
            target,
            busy_timeout: Duration::from_secs(5),
            seed: true,
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            password_hasher: Arc::new(Argon2Hasher),
        }
    }

    /// Creates a file-backed configuration.
    ///
    /// ## Arguments
    /// * `path` - Path to the SQLite database file. Will be created if it doesn't exist.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_target(DbTarget::File(path.into()))
    }

    /// Creates an in-memory configuration.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory());
    /// // Isolated store, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        Self::with_target(DbTarget::Memory)
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// [`DbConfig::from_env`] is this with `std::env::var`; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = lookup(ENV_DB_MODE).unwrap_or_else(|| "file".to_string());

        let mut config = match mode.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | ":memory:" => DbConfig::in_memory(),
            "file" => DbConfig::file(
                lookup(ENV_DB_PATH).unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            ),
            _ => return Err(ConfigError::InvalidValue(ENV_DB_MODE.to_string())),
        };

        if let Some(seed) = lookup(ENV_SEED) {
            config.seed = seed
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(ENV_SEED.to_string()))?;
        }

        if let Some(password) = lookup(ENV_ADMIN_PASSWORD) {
            if password.is_empty() {
                return Err(ConfigError::InvalidValue(ENV_ADMIN_PASSWORD.to_string()));
            }
            config.admin_password = password;
        }

        Ok(config)
    }

    /// Sets the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets whether baseline rows are inserted.
    pub fn seed(mut self, seed: bool) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the seeded admin password.
    pub fn admin_password(mut self, password: impl Into<String>) -> Self {
        self.admin_password = password.into();
        self
    }

    /// Replaces the password hasher.
    pub fn password_hasher(mut self, hasher: Arc<dyn PasswordHasher>) -> Self {
        self.password_hasher = hasher;
        self
    }

    /// Builds sqlx connect options for the target.
    ///
    /// - WAL journal + NORMAL synchronous for file targets
    /// - Foreign keys enforced (SQLite has them off by default)
    pub(crate) fn connect_options(&self) -> SqliteConnectOptions {
        let options = match &self.target {
            DbTarget::Memory => SqliteConnectOptions::new().in_memory(true),
            DbTarget::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
        };

        options
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("target", &self.target)
            .field("busy_timeout", &self.busy_timeout)
            .field("seed", &self.seed)
            .field("admin_password", &"<redacted>")
            .field("password_hasher", &self.password_hasher)
            .finish()
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
