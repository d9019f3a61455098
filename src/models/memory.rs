//! In-process stores used by the pipeline tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::SecretString;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::{
    Credentials, InsertUserError, LookupError, Snippet, SnippetId, SnippetStore, UserId,
    UserStore, LATEST_LIMIT,
};

struct UserRow {
    id: UserId,
    name: String,
    email: String,
    hashed_password: String,
}

#[derive(Default)]
pub(crate) struct MemoryUserStore {
    users: RwLock<Vec<UserRow>>,
    fail_exists: AtomicBool,
}

impl MemoryUserStore {
    pub(crate) async fn count(&self) -> usize {
        self.users.read().await.len()
    }

    pub(crate) async fn delete(&self, id: UserId) {
        self.users.write().await.retain(|user| user.id != id);
    }

    pub(crate) async fn name_of(&self, id: UserId) -> Option<String> {
        self.users
            .read()
            .await
            .iter()
            .find(|user| user.id == id)
            .map(|user| user.name.clone())
    }

    /// Make every later `exists` call fail.
    pub(crate) fn break_exists(&self) {
        self.fail_exists.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> Result<UserId, InsertUserError> {
        let mut users = self.users.write().await;
        if users.iter().any(|user| user.email == email) {
            return Err(InsertUserError::DuplicateEmail);
        }
        let id = users.iter().map(|user| user.id).max().unwrap_or(0) + 1;
        users.push(UserRow {
            id,
            name: name.to_string(),
            email: email.to_string(),
            hashed_password: hashed_password.to_string(),
        });
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Credentials, LookupError> {
        self.users
            .read()
            .await
            .iter()
            .find(|user| user.email == email)
            .map(|user| Credentials {
                id: user.id,
                hashed_password: SecretString::from(user.hashed_password.clone()),
            })
            .ok_or(LookupError::NotFound)
    }

    async fn exists(&self, id: UserId) -> anyhow::Result<bool> {
        if self.fail_exists.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("user store unavailable"));
        }
        Ok(self.users.read().await.iter().any(|user| user.id == id))
    }
}

#[derive(Default)]
pub(crate) struct MemorySnippetStore {
    snippets: RwLock<Vec<Snippet>>,
    inserts: AtomicUsize,
}

impl MemorySnippetStore {
    pub(crate) fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnippetStore for MemorySnippetStore {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_days: i32,
    ) -> anyhow::Result<SnippetId> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let mut snippets = self.snippets.write().await;
        let id = snippets.iter().map(|snippet| snippet.id).max().unwrap_or(0) + 1;
        let created = Utc::now();
        snippets.push(Snippet {
            id,
            title: title.to_string(),
            content: content.to_string(),
            created,
            expires: created + Duration::days(i64::from(expires_days)),
        });
        Ok(id)
    }

    async fn get(&self, id: SnippetId) -> Result<Snippet, LookupError> {
        let now = Utc::now();
        self.snippets
            .read()
            .await
            .iter()
            .find(|snippet| snippet.id == id && snippet.expires > now)
            .cloned()
            .ok_or(LookupError::NotFound)
    }

    async fn latest(&self) -> anyhow::Result<Vec<Snippet>> {
        let now = Utc::now();
        let snippets = self.snippets.read().await;
        Ok(snippets
            .iter()
            .rev()
            .filter(|snippet| snippet.expires > now)
            .take(usize::try_from(LATEST_LIMIT).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn duplicate_email_is_reported() -> Result<()> {
        let store = MemoryUserStore::default();
        store.insert("a", "a@example.com", "hash").await?;
        assert!(matches!(
            store.insert("b", "a@example.com", "hash").await,
            Err(InsertUserError::DuplicateEmail)
        ));
        assert_eq!(store.count().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn latest_is_newest_first_and_capped() -> Result<()> {
        let store = MemorySnippetStore::default();
        for index in 0..12 {
            store.insert(&format!("t{index}"), "c", 7).await?;
        }
        let latest = store.latest().await?;
        assert_eq!(latest.len(), 10);
        assert_eq!(latest[0].title, "t11");
        Ok(())
    }
}
