//! Password hashing and verification.
//!
//! `PasswordHash` wraps a bcrypt hash so that plaintext passwords never leave
//! the registration and login handlers.

use std::fmt::Display;

use bcrypt::{hash, verify};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A salted and hashed password.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// An alias for the default encryption cost for hashing passwords.
    pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;

    /// Hash a plaintext password with the specified `cost`.
    ///
    /// `cost` increases the rounds of hashing and therefore the time needed
    /// to verify a password. Pass in [PasswordHash::DEFAULT_COST] to use the
    /// recommended cost. Bcrypt generates a random per-password salt, so the
    /// same plaintext hashes to different strings on each call.
    ///
    /// # Errors
    ///
    /// Returns [Error::Hashing] if the password could not be hashed.
    pub fn new(plaintext: &str, cost: u32) -> Result<Self, Error> {
        hash(plaintext, cost)
            .map(Self)
            .map_err(|error| Error::Hashing(error.to_string()))
    }

    /// Create a `PasswordHash` from a string that is already a bcrypt hash.
    ///
    /// The caller should ensure that `raw_password_hash` is a valid hash,
    /// e.g. a value previously stored in the database.
    pub fn new_unchecked(raw_password_hash: &str) -> Self {
        Self(raw_password_hash.to_string())
    }

    /// Check whether `plaintext` matches this hash.
    ///
    /// # Errors
    ///
    /// Returns [Error::Hashing] if the stored hash could not be parsed.
    pub fn verify(&self, plaintext: &str) -> Result<bool, Error> {
        verify(plaintext, &self.0).map_err(|error| Error::Hashing(error.to_string()))
    }
}

impl AsRef<str> for PasswordHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
