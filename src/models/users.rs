use anyhow::Context;
use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};

use super::{is_unique_violation, Credentials, InsertUserError, LookupError, UserId, UserStore};

const EMAIL_CONSTRAINT: &str = "users_uc_email";

#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> Result<UserId, InsertUserError> {
        let query = r"
            INSERT INTO users (name, email, hashed_password, created)
            VALUES ($1, $2, $3, NOW())
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .bind(email)
            .bind(hashed_password)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match row {
            Ok(row) => Ok(row.get("id")),
            Err(err) if is_unique_violation(&err, EMAIL_CONSTRAINT) => {
                Err(InsertUserError::DuplicateEmail)
            }
            Err(err) => Err(InsertUserError::Other(
                anyhow::Error::new(err).context("failed to insert user"),
            )),
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Credentials, LookupError> {
        let query = "SELECT id, hashed_password FROM users WHERE email = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user credentials")?;

        let row = row.ok_or(LookupError::NotFound)?;
        let hashed_password: String = row.get("hashed_password");
        Ok(Credentials {
            id: row.get("id"),
            hashed_password: SecretString::from(hashed_password),
        })
    }

    async fn exists(&self, id: UserId) -> anyhow::Result<bool> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1) AS exists";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to check user existence")?;

        Ok(row.get("exists"))
    }
}
