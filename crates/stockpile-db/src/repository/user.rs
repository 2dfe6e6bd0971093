//! # User Repository
//!
//! Accounts and password login. Hashing goes through the configured
//! [`PasswordHasher`](stockpile_core::PasswordHasher); plain-text passwords
//! are never stored or logged.

use stockpile_core::validation::{validate_name, validate_username};
use stockpile_core::{Role, User};
use tracing::{debug, info};

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::params;
use crate::repository::{enumerated, new_id, now_text, timestamp};
use crate::value::Row;

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(db: Database) -> Self {
        UserRepository { db }
    }

    /// Creates an account with a hashed password.
    ///
    /// ## Errors
    /// * `DbError::Domain` - Invalid username or empty password
    /// * `DbError::UniqueViolation` - Username taken
    pub async fn create(&self, username: &str, password: &str, role: Role) -> DbResult<User> {
        validate_username(username)?;
        validate_name("password", password)?;
        let username = username.trim();

        let password_hash = self.db.config().password_hasher.hash(password)?;
        let id = new_id();

        self.db
            .execute(
                r#"
                INSERT INTO users (id, username, password_hash, role, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                &params![id.as_str(), username, password_hash, role.as_str(), now_text()],
            )
            .await?;

        info!(id = %id, username = %username, role = %role, "User created");

        self.find_by_username(username)
            .await?
            .ok_or_else(|| DbError::not_found("User", username))
    }

    /// Looks up an account by username.
    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let row = self
            .db
            .query_one("SELECT * FROM users WHERE username = ?1", &params![username])
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Checks a login.
    ///
    /// ## Returns
    /// * `Ok(Some(User))` - Credentials match
    /// * `Ok(None)` - Unknown username or wrong password (not distinguished)
    pub async fn authenticate(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let user = match self.find_by_username(username).await? {
            Some(user) => user,
            None => {
                debug!(username = %username, "Login for unknown user");
                return Ok(None);
            }
        };

        if self
            .db
            .config()
            .password_hasher
            .verify(password, &user.password_hash)
        {
            Ok(Some(user))
        } else {
            debug!(username = %username, "Login with wrong password");
            Ok(None)
        }
    }
}

fn user_from_row(row: &Row) -> DbResult<User> {
    Ok(User {
        id: row.text("id")?,
        username: row.text("username")?,
        password_hash: row.text("password_hash")?,
        role: enumerated(row, "role")?,
        created_at: timestamp(row, "created_at")?,
    })
}
