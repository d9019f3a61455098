use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

/// Session values by key.
pub type SessionData = BTreeMap<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub data: SessionData,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Durable session storage keyed by the SHA-256 of the session token.
///
/// Implementations must be safe to share across request tasks. Updates are
/// last-write-wins on an existing record; only [`SessionStore::rotate`] creates
/// records, and it must replace the old key with the new one atomically.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>>;

    /// Overwrite the record stored under `token_hash`.
    ///
    /// Never creates a record. Returns `false` when no record matched, e.g. the
    /// token was rotated away or purged since it was loaded.
    async fn update(&self, token_hash: &[u8], record: &SessionRecord) -> Result<bool>;

    /// Store `record` under `new_hash` and drop `old_hash` in one step.
    async fn rotate(
        &self,
        old_hash: Option<&[u8]>,
        new_hash: &[u8],
        record: &SessionRecord,
    ) -> Result<()>;

    async fn delete(&self, token_hash: &[u8]) -> Result<()>;

    /// Remove every expired record, returning how many were dropped.
    async fn delete_expired(&self) -> Result<u64>;
}
