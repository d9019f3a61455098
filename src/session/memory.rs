use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::store::{SessionRecord, SessionStore};

/// Process-local session store. Sessions do not survive a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Vec<u8>, SessionRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        Ok(self.records.read().await.get(token_hash).cloned())
    }

    async fn update(&self, token_hash: &[u8], record: &SessionRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(token_hash) {
            Some(stored) => {
                *stored = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn rotate(
        &self,
        old_hash: Option<&[u8]>,
        new_hash: &[u8],
        record: &SessionRecord,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(old_hash) = old_hash {
            records.remove(old_hash);
        }
        records.insert(new_hash.to_vec(), record.clone());
        Ok(())
    }

    async fn delete(&self, token_hash: &[u8]) -> Result<()> {
        self.records.write().await.remove(token_hash);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !record.is_expired(now));
        Ok(u64::try_from(before - records.len()).unwrap_or(u64::MAX))
    }
}
