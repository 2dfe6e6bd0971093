//! # Password Hashing
//!
//! The data layer treats password hashing as an opaque one-way function: it
//! only needs something that turns a password into a storable string and can
//! later check a candidate against it. [`PasswordHasher`] is that seam, and
//! [`Argon2Hasher`] is the production implementation.
//!
//! ```text
//! bootstrap / create user ──► hasher.hash("secret") ──► "$argon2id$v=19$..."
//! login                   ──► hasher.verify("secret", stored) ──► true
//! ```

use std::fmt::Debug;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordVerifier};

use crate::error::{CoreError, CoreResult};

/// One-way password hashing.
pub trait PasswordHasher: Send + Sync + Debug {
    /// Hashes a password into a self-describing string.
    fn hash(&self, password: &str) -> CoreResult<String>;

    /// Returns true if `password` matches `hash`. Malformed hashes never match.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Argon2id with the crate's default parameters and a random salt.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Hasher;

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> CoreResult<String> {
        use argon2::PasswordHasher as _;

        let salt = SaltString::generate(&mut OsRng);

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CoreError::PasswordHash(e.to_string()))?;

        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
