//! Persistence collaborators for users and snippets.
//!
//! Handlers and the auth service only ever see the [`UserStore`] and
//! [`SnippetStore`] traits; the Postgres implementations live in [`users`] and
//! [`snippets`].

pub mod snippets;
pub mod users;

#[cfg(test)]
pub(crate) mod memory;

pub use snippets::PgSnippetStore;
pub use users::PgUserStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;

pub type UserId = i64;
pub type SnippetId = i64;

/// How many snippets the home page lists.
pub const LATEST_LIMIT: i64 = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snippet {
    pub id: SnippetId,
    pub title: String,
    pub content: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

/// Stored credentials for one user. Only the auth service reads these.
#[derive(Debug)]
pub struct Credentials {
    pub id: UserId,
    pub hashed_password: SecretString,
}

#[derive(Debug, Error)]
pub enum InsertUserError {
    #[error("duplicate email")]
    DuplicateEmail,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no matching record found")]
    NotFound,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user with an already-hashed password.
    async fn insert(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> Result<UserId, InsertUserError>;

    async fn find_by_email(&self, email: &str) -> Result<Credentials, LookupError>;

    async fn exists(&self, id: UserId) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait SnippetStore: Send + Sync {
    async fn insert(&self, title: &str, content: &str, expires_days: i32)
        -> anyhow::Result<SnippetId>;

    /// Fetch an unexpired snippet.
    async fn get(&self, id: SnippetId) -> Result<Snippet, LookupError>;

    /// Most recent unexpired snippets, newest first.
    async fn latest(&self) -> anyhow::Result<Vec<Snippet>>;
}

pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().is_some_and(|code| code.as_ref() == "23505")
                && db_err.constraint().map_or(true, |name| name == constraint)
        }
        _ => false,
    }
}
