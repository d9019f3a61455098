//! Credential checks and user registration.
//!
//! The service owns every touch of password material: it hashes on
//! registration, verifies on login, and never hands a stored hash back to
//! callers. Session state (who is signed in) is the handlers' concern.

pub mod password;

pub use password::PasswordHasherConfig;

use anyhow::{anyhow, Context};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::forms::normalize_email;
use crate::models::{InsertUserError, LookupError, UserId, UserStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("duplicate email")]
    DuplicateEmail,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasherConfig,
    dummy_hash: SecretString,
}

impl AuthService {
    /// Build the service and precompute the hash used for unknown emails.
    ///
    /// # Errors
    /// Returns an error if the dummy hash cannot be computed.
    pub fn new(users: Arc<dyn UserStore>, hasher: PasswordHasherConfig) -> anyhow::Result<Self> {
        let dummy_hash = hasher
            .hash(&SecretString::from("snippetbox-dummy-password"))
            .context("failed to compute dummy password hash")?;
        Ok(Self {
            users,
            hasher,
            dummy_hash,
        })
    }

    /// Create a user and return its id.
    ///
    /// # Errors
    /// [`RegisterError::DuplicateEmail`] when the email is already taken.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<UserId, RegisterError> {
        let email = normalize_email(email);
        let hashed = self.hash_blocking(password.clone()).await?;

        match self
            .users
            .insert(name.trim(), &email, hashed.expose_secret())
            .await
        {
            Ok(id) => Ok(id),
            Err(InsertUserError::DuplicateEmail) => Err(RegisterError::DuplicateEmail),
            Err(InsertUserError::Other(err)) => Err(RegisterError::Internal(err)),
        }
    }

    /// Check credentials and return the matching user id.
    ///
    /// Unknown emails still pay for one verification so response timing does
    /// not reveal which emails are registered.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`] for an unknown email or a wrong password.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<UserId, AuthError> {
        let email = normalize_email(email);
        let (id, hash) = match self.users.find_by_email(&email).await {
            Ok(credentials) => (Some(credentials.id), credentials.hashed_password),
            Err(LookupError::NotFound) => (None, self.dummy_hash.clone()),
            Err(LookupError::Other(err)) => return Err(AuthError::Internal(err)),
        };

        let verified = self.verify_blocking(password.clone(), hash).await?;
        match id {
            Some(id) if verified => Ok(id),
            _ => {
                debug!("authentication failed");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Whether `id` still refers to a stored user.
    ///
    /// # Errors
    /// Returns an error if the user store fails.
    pub async fn user_exists(&self, id: UserId) -> anyhow::Result<bool> {
        self.users.exists(id).await
    }

    async fn hash_blocking(&self, password: SecretString) -> anyhow::Result<SecretString> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| anyhow!("password hashing task failed: {e}"))?
    }

    async fn verify_blocking(
        &self,
        password: SecretString,
        hash: SecretString,
    ) -> anyhow::Result<bool> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| anyhow!("password verification task failed: {e}"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::memory::MemoryUserStore;
    use anyhow::Result;

    fn service() -> Result<(Arc<MemoryUserStore>, AuthService)> {
        let users = Arc::new(MemoryUserStore::default());
        let auth = AuthService::new(users.clone(), PasswordHasherConfig::new(64, 1, 1)?)?;
        Ok((users, auth))
    }

    fn secret(value: &str) -> SecretString {
        SecretString::from(value)
    }

    #[tokio::test]
    async fn register_then_authenticate() -> Result<()> {
        let (_users, auth) = service()?;
        let id = auth
            .register("Alice", "alice@example.com", &secret("pa55word!"))
            .await?;
        let authenticated = auth
            .authenticate("alice@example.com", &secret("pa55word!"))
            .await?;
        assert_eq!(id, authenticated);
        Ok(())
    }

    #[tokio::test]
    async fn email_is_normalised_on_both_paths() -> Result<()> {
        let (_users, auth) = service()?;
        let id = auth
            .register("Alice", "  Alice@Example.COM ", &secret("pa55word!"))
            .await?;
        let authenticated = auth
            .authenticate("ALICE@example.com", &secret("pa55word!"))
            .await?;
        assert_eq!(id, authenticated);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() -> Result<()> {
        let (_users, auth) = service()?;
        auth.register("Alice", "alice@example.com", &secret("pa55word!"))
            .await?;

        let wrong = auth
            .authenticate("alice@example.com", &secret("not-the-password"))
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        let unknown = auth
            .authenticate("bob@example.com", &secret("pa55word!"))
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_rejected() -> Result<()> {
        let (users, auth) = service()?;
        auth.register("Alice", "alice@example.com", &secret("pa55word!"))
            .await?;
        let second = auth
            .register("Other", "ALICE@example.com", &secret("another1!"))
            .await;
        assert!(matches!(second, Err(RegisterError::DuplicateEmail)));
        assert_eq!(users.count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn user_exists_tracks_store() -> Result<()> {
        let (users, auth) = service()?;
        let id = auth
            .register("Alice", "alice@example.com", &secret("pa55word!"))
            .await?;
        assert!(auth.user_exists(id).await?);
        users.delete(id).await;
        assert!(!auth.user_exists(id).await?);
        Ok(())
    }

    #[tokio::test]
    async fn user_exists_propagates_store_failure() -> Result<()> {
        let (users, auth) = service()?;
        users.break_exists();
        assert!(auth.user_exists(1).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn stored_name_is_trimmed() -> Result<()> {
        let (users, auth) = service()?;
        let id = auth
            .register("  Alice  ", "alice@example.com", &secret("pa55word!"))
            .await?;
        assert_eq!(users.name_of(id).await, Some("Alice".to_string()));
        Ok(())
    }
}
