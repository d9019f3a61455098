use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::{info_span, Instrument};

use super::{LookupError, Snippet, SnippetId, SnippetStore, LATEST_LIMIT};

#[derive(Clone, Debug)]
pub struct PgSnippetStore {
    pool: PgPool,
}

impl PgSnippetStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn snippet_from_row(row: &PgRow) -> Snippet {
    Snippet {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        created: row.get("created"),
        expires: row.get("expires"),
    }
}

#[async_trait]
impl SnippetStore for PgSnippetStore {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: i32,
    ) -> anyhow::Result<SnippetId> {
        let query = r"
            INSERT INTO snippets (title, content, created, expires)
            VALUES ($1, $2, NOW(), NOW() + ($3 * INTERVAL '1 day'))
            RETURNING id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(title)
            .bind(content)
            .bind(expires_days)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to insert snippet")?;

        Ok(row.get("id"))
    }

    async fn get(&self, id: SnippetId) -> Result<Snippet, LookupError> {
        let query = r"
            SELECT id, title, content, created, expires
            FROM snippets
            WHERE expires > NOW() AND id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch snippet")?;

        row.as_ref()
            .map(snippet_from_row)
            .ok_or(LookupError::NotFound)
    }

    async fn latest(&self) -> anyhow::Result<Vec<Snippet>> {
        let query = r"
            SELECT id, title, content, created, expires
            FROM snippets
            WHERE expires > NOW()
            ORDER BY id DESC
            LIMIT $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .bind(LATEST_LIMIT)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to fetch latest snippets")?;

        Ok(rows.iter().map(snippet_from_row).collect())
    }
}
