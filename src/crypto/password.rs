//! Password hashing with Argon2id.
//!
//! Hashing is CPU bound; the async helpers run it on the blocking pool so a
//! burst of logins cannot stall the runtime.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use thiserror::Error;

use crate::config::AuthConfig;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("invalid hashing parameters: {0}")]
    Params(String),

    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Argon2id hasher configured from `[auth]`.
#[derive(Debug, Clone)]
pub struct CredentialHasher {
    params: Params,
    /// Hash verified against when the login email is unknown
    dummy_hash: String,
}

impl CredentialHasher {
    pub fn new(cost: u32, memory_kib: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, cost, 1, None)
            .map_err(|e| PasswordError::Params(e.to_string()))?;

        let mut hasher = Self {
            params,
            dummy_hash: String::new(),
        };
        hasher.dummy_hash = hasher.hash_blocking("stockroom-placeholder-password")?;
        Ok(hasher)
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, PasswordError> {
        Self::new(config.password_hash_cost, config.password_hash_memory_kib)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash on the current thread. Prefer [`CredentialHasher::hash`] from async code.
    pub fn hash_blocking(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Verify on the current thread. Malformed hashes never match.
    pub fn verify_blocking(&self, password: &str, hash: &str) -> bool {
        let parsed = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };
        // Parameters are read from the PHC string, so older hashes still verify
        // after the configured cost changes.
        self.argon2()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    pub async fn hash(&self, password: String) -> Result<String, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash_blocking(&password)).await?
    }

    pub async fn verify(&self, password: String, hash: String) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        Ok(tokio::task::spawn_blocking(move || hasher.verify_blocking(&password, &hash)).await?)
    }

    /// Burn the same work as a real verification. Used when the email is unknown
    /// so both login failure paths take comparable time.
    pub async fn verify_dummy(&self, password: String) -> Result<(), PasswordError> {
        let hash = self.dummy_hash.clone();
        self.verify(password, hash).await.map(|_| ())
    }
}
