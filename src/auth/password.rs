//! Argon2id password hashing.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so
//! verification reads the cost parameters from the stored value and keeps
//! working after the configured cost changes.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use secrecy::{ExposeSecret, SecretString};

pub const DEFAULT_MEMORY_KIB: u32 = 19_456;
pub const DEFAULT_ITERATIONS: u32 = 2;
pub const DEFAULT_PARALLELISM: u32 = 1;

/// Argon2id cost parameters.
#[derive(Clone, Debug)]
pub struct PasswordHasherConfig {
    params: Params,
}

impl PasswordHasherConfig {
    /// # Errors
    /// Returns an error if the parameters are outside what Argon2 accepts.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| anyhow!("invalid argon2 parameters: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash `password` with a fresh random salt.
    ///
    /// # Errors
    /// Returns an error if hashing fails.
    pub fn hash(&self, password: &SecretString) -> Result<SecretString> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash password: {e}"))?;
        Ok(SecretString::from(hash.to_string()))
    }

    /// Check `password` against a stored PHC hash.
    ///
    /// # Errors
    /// Returns an error only when the stored hash cannot be parsed.
    pub fn verify(&self, password: &SecretString, hash: &SecretString) -> Result<bool> {
        let parsed = PasswordHash::new(hash.expose_secret())
            .map_err(|e| anyhow!("invalid password hash: {e}"))?;
        Ok(self
            .argon2()
            .verify_password(password.expose_secret().as_bytes(), &parsed)
            .is_ok())
    }
}

impl Default for PasswordHasherConfig {
    fn default() -> Self {
        Self {
            params: Params::new(DEFAULT_MEMORY_KIB, DEFAULT_ITERATIONS, DEFAULT_PARALLELISM, None)
                .unwrap_or_default(),
        }
    }
}
