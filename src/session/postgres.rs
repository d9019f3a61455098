use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::{info_span, Instrument};

use super::store::{SessionData, SessionRecord, SessionStore};

/// Sessions persisted in the `sessions` table.
#[derive(Clone, Debug)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn encode_data(data: &SessionData) -> Result<String> {
    serde_json::to_string(data).context("failed to serialize session data")
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT data::text AS data, expires_at
            FROM sessions
            WHERE token_hash = $1 AND expires_at > NOW()
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        let Some(row) = row else {
            return Ok(None);
        };
        let data: String = row.get("data");
        let data: SessionData =
            serde_json::from_str(&data).context("failed to deserialize session data")?;
        Ok(Some(SessionRecord {
            data,
            expires_at: row.get("expires_at"),
        }))
    }

    async fn update(&self, token_hash: &[u8], record: &SessionRecord) -> Result<bool> {
        let query = r"
            UPDATE sessions
            SET data = $2::jsonb, expires_at = $3
            WHERE token_hash = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(token_hash)
            .bind(encode_data(&record.data)?)
            .bind(record.expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update session")?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate(
        &self,
        old_hash: Option<&[u8]>,
        new_hash: &[u8],
        record: &SessionRecord,
    ) -> Result<()> {
        // Old key removal and new key insert commit together so a rotated
        // token can never resolve after the new one is issued.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin session rotation transaction")?;

        if let Some(old_hash) = old_hash {
            let query = "DELETE FROM sessions WHERE token_hash = $1";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DELETE",
                db.statement = query
            );
            sqlx::query(query)
                .bind(old_hash)
                .execute(&mut *tx)
                .instrument(span)
                .await
                .context("failed to delete rotated session")?;
        }

        let query = r"
            INSERT INTO sessions (token_hash, data, expires_at)
            VALUES ($1, $2::jsonb, $3)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(new_hash)
            .bind(encode_data(&record.data)?)
            .bind(record.expires_at)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert rotated session")?;

        tx.commit()
            .await
            .context("commit session rotation transaction")?;
        Ok(())
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<()> {
        let query = "DELETE FROM sessions WHERE token_hash = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete session")?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let query = "DELETE FROM sessions WHERE expires_at <= NOW()";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete expired sessions")?;
        Ok(result.rows_affected())
    }
}
