//! Server-side sessions.
//!
//! Flow Overview:
//! - [`SessionManager::load`] resolves the cookie token to a [`Session`] handle.
//!   Missing, malformed, unknown, and expired tokens all yield a fresh, empty
//!   session; the client cannot tell them apart.
//! - Handlers read and write values on the handle. Nothing touches the store
//!   until [`SessionManager::commit`] runs after the handler.
//! - Commit writes modified sessions with a new expiry and returns a
//!   `Set-Cookie` value only when the client needs a new token (first write or
//!   rotation). Destroyed sessions are deleted and the cookie is cleared.
//! - A commit under the loaded token only updates an existing record. If a
//!   concurrent request rotated or destroyed that token first, the write is
//!   dropped rather than resurrecting the old key.
//!
//! Token rotation ([`Session::renew_token`]) keeps the data but swaps the key.
//! The previously presented token is deleted in the same store operation that
//! writes the new one, so it stops resolving as soon as the response is sent.

mod memory;
mod postgres;
mod store;
pub mod token;

pub use memory::MemoryStore;
pub use postgres::PgSessionStore;
pub use store::{SessionData, SessionRecord, SessionStore};

use anyhow::{anyhow, Result};
use axum::http::{HeaderMap, HeaderValue};
use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, error};

use self::token::{
    clear_session_cookie, extract_session_token, generate_session_token, hash_session_token,
    is_well_formed, session_cookie,
};

/// Session key holding the signed-in user's id.
pub const AUTHENTICATED_USER_ID: &str = "authenticatedUserId";
/// Session key holding a one-shot message for the next rendered page.
pub const FLASH: &str = "flash";

const DEFAULT_LIFETIME_SECONDS: i64 = 12 * 60 * 60;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    lifetime_seconds: i64,
    cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lifetime_seconds: DEFAULT_LIFETIME_SECONDS,
            cookie_secure: false,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_lifetime_seconds(mut self, seconds: i64) -> Self {
        self.lifetime_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn lifetime_seconds(&self) -> i64 {
        self.lifetime_seconds
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Unmodified,
    Modified,
    Destroyed,
}

#[derive(Debug)]
struct State {
    /// Token presented by the client that resolved to a stored record.
    loaded_token: Option<String>,
    /// Token the session will be stored under; `None` until one is needed.
    token: Option<String>,
    status: Status,
    data: SessionData,
}

/// Request-scoped handle to one session. Cheap to clone; clones share state.
#[derive(Clone, Debug)]
pub struct Session {
    state: Arc<Mutex<State>>,
}

struct Snapshot {
    loaded_token: Option<String>,
    token: Option<String>,
    status: Status,
    data: SessionData,
}

impl Session {
    fn new(loaded_token: Option<String>, data: SessionData) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                token: loaded_token.clone(),
                loaded_token,
                status: Status::Unmodified,
                data,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current token, if the session has one yet.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let state = self.lock();
        state
            .data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    pub fn put(&self, key: &str, value: impl Into<Value>) {
        let mut state = self.lock();
        if state.status == Status::Destroyed {
            // Writing after destroy starts a brand new session.
            state.token = None;
        }
        state.data.insert(key.to_string(), value.into());
        state.status = Status::Modified;
    }

    pub fn remove(&self, key: &str) {
        let mut state = self.lock();
        if state.data.remove(key).is_some() && state.status == Status::Unmodified {
            state.status = Status::Modified;
        }
    }

    /// Read and remove `key` in one step (used for flash messages).
    pub fn pop<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut state = self.lock();
        let value = state.data.remove(key)?;
        if state.status == Status::Unmodified {
            state.status = Status::Modified;
        }
        serde_json::from_value(value).ok()
    }

    /// Issue a new token for this session, keeping its data.
    ///
    /// # Errors
    /// Returns an error if the OS random source fails.
    pub fn renew_token(&self) -> Result<String> {
        let token = generate_session_token()?;
        let mut state = self.lock();
        state.token = Some(token.clone());
        state.status = Status::Modified;
        Ok(token)
    }

    /// Drop all data; commit deletes the stored record and clears the cookie.
    pub fn destroy(&self) {
        let mut state = self.lock();
        state.data.clear();
        state.token = None;
        state.status = Status::Destroyed;
    }

    fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            loaded_token: state.loaded_token.clone(),
            token: state.token.clone(),
            status: state.status,
            data: state.data.clone(),
        }
    }

    fn committed(&self, token: Option<String>) {
        let mut state = self.lock();
        state.loaded_token.clone_from(&token);
        state.token = token;
        state.status = Status::Unmodified;
    }
}

/// Loads and commits sessions against a shared [`SessionStore`].
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.store)
    }

    /// Resolve `token` to a session, or start an empty one.
    ///
    /// # Errors
    /// Returns an error only when the store itself fails.
    pub async fn load(&self, token: Option<&str>) -> Result<Session> {
        let Some(token) = token.filter(|token| is_well_formed(token)) else {
            return Ok(Session::new(None, SessionData::new()));
        };
        match self.store.find(&hash_session_token(token)).await? {
            Some(record) if !record.is_expired(Utc::now()) => {
                Ok(Session::new(Some(token.to_string()), record.data))
            }
            _ => Ok(Session::new(None, SessionData::new())),
        }
    }

    /// [`SessionManager::load`] using the session cookie from `headers`.
    ///
    /// # Errors
    /// Returns an error only when the store itself fails.
    pub async fn load_from_headers(&self, headers: &HeaderMap) -> Result<Session> {
        let token = extract_session_token(headers);
        self.load(token.as_deref()).await
    }

    fn expiry(&self) -> Result<DateTime<Utc>> {
        TimeDelta::try_seconds(self.config.lifetime_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                anyhow!(
                    "session lifetime out of range: {}s",
                    self.config.lifetime_seconds
                )
            })
    }

    /// Persist `session` and return the `Set-Cookie` value the response needs, if any.
    ///
    /// # Errors
    /// Returns an error if the store write fails or the cookie cannot be encoded.
    pub async fn commit(&self, session: &Session) -> Result<Option<HeaderValue>> {
        let snapshot = session.snapshot();
        match snapshot.status {
            Status::Unmodified => Ok(None),
            Status::Destroyed => {
                if let Some(loaded) = snapshot.loaded_token.as_deref() {
                    self.store.delete(&hash_session_token(loaded)).await?;
                }
                session.committed(None);
                Ok(Some(clear_session_cookie(self.config.cookie_secure)?))
            }
            Status::Modified => {
                let token = match snapshot.token {
                    Some(token) => token,
                    None => generate_session_token()?,
                };
                let record = SessionRecord {
                    data: snapshot.data,
                    expires_at: self.expiry()?,
                };
                let new_hash = hash_session_token(&token);
                let issued = snapshot.loaded_token.as_deref() != Some(token.as_str());

                if issued {
                    let old_hash = snapshot.loaded_token.as_deref().map(hash_session_token);
                    self.store
                        .rotate(old_hash.as_deref(), &new_hash, &record)
                        .await?;
                } else if !self.store.update(&new_hash, &record).await? {
                    // Rotated away or purged by another request since load.
                    debug!("session vanished before commit, write dropped");
                    session.committed(None);
                    return Ok(None);
                }

                let cookie = if issued {
                    Some(session_cookie(
                        &token,
                        self.config.lifetime_seconds,
                        self.config.cookie_secure,
                    )?)
                } else {
                    None
                };
                session.committed(Some(token));
                Ok(cookie)
            }
        }
    }
}

/// Periodically purge expired sessions from `store`.
pub fn spawn_cleanup(store: Arc<dyn SessionStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            match store.delete_expired().await {
                Ok(0) => {}
                Ok(removed) => debug!(removed, "expired sessions removed"),
                Err(err) => error!("session cleanup failed: {err:#}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn manager() -> (Arc<MemoryStore>, SessionManager) {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(store.clone(), SessionConfig::new());
        (store, manager)
    }

    fn cookie_token(cookie: &HeaderValue) -> Option<String> {
        let mut headers = HeaderMap::new();
        let value = cookie.to_str().ok()?.split(';').next()?.to_string();
        headers.insert(COOKIE, HeaderValue::from_str(&value).ok()?);
        extract_session_token(&headers)
    }

    #[tokio::test]
    async fn untouched_session_is_never_stored() -> Result<()> {
        let (store, manager) = manager();
        let session = manager.load(None).await?;
        assert!(session.token().is_none());
        assert!(manager.commit(&session).await?.is_none());
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn first_write_issues_cookie_and_round_trips() -> Result<()> {
        let (_store, manager) = manager();
        let session = manager.load(None).await?;
        session.put(FLASH, "hello");
        session.put(AUTHENTICATED_USER_ID, 7);

        let cookie = manager.commit(&session).await?;
        let token = cookie.as_ref().and_then(cookie_token);
        assert!(token.is_some());
        assert_eq!(token, session.token());

        let reloaded = manager.load(token.as_deref()).await?;
        assert_eq!(reloaded.get::<i64>(AUTHENTICATED_USER_ID), Some(7));
        assert_eq!(reloaded.pop::<String>(FLASH), Some("hello".to_string()));
        assert!(!reloaded.contains(FLASH));
        Ok(())
    }

    #[tokio::test]
    async fn modifying_existing_session_needs_no_new_cookie() -> Result<()> {
        let (_store, manager) = manager();
        let session = manager.load(None).await?;
        session.put(FLASH, "one");
        manager.commit(&session).await?;

        let reloaded = manager.load(session.token().as_deref()).await?;
        reloaded.put(FLASH, "two");
        assert!(manager.commit(&reloaded).await?.is_none());

        let again = manager.load(session.token().as_deref()).await?;
        assert_eq!(again.get::<String>(FLASH), Some("two".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn renew_token_rotates_and_invalidates_old_token() -> Result<()> {
        let (store, manager) = manager();
        let session = manager.load(None).await?;
        session.put(FLASH, "keep me");
        manager.commit(&session).await?;
        let old_token = session.token();

        let loaded = manager.load(old_token.as_deref()).await?;
        let new_token = loaded.renew_token()?;
        assert_ne!(Some(new_token.clone()), old_token);

        let cookie = manager.commit(&loaded).await?;
        assert_eq!(cookie.as_ref().and_then(cookie_token), Some(new_token.clone()));
        assert_eq!(store.len().await, 1);

        let stale = manager.load(old_token.as_deref()).await?;
        assert!(stale.get::<String>(FLASH).is_none());
        assert!(stale.token().is_none());

        let fresh = manager.load(Some(&new_token)).await?;
        assert_eq!(fresh.get::<String>(FLASH), Some("keep me".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn stale_commit_cannot_revive_rotated_token() -> Result<()> {
        let (store, manager) = manager();
        let session = manager.load(None).await?;
        session.put(AUTHENTICATED_USER_ID, 1);
        manager.commit(&session).await?;
        let old_token = session.token();

        // Two in-flight requests holding the same token.
        let logout = manager.load(old_token.as_deref()).await?;
        let stale = manager.load(old_token.as_deref()).await?;

        logout.renew_token()?;
        logout.remove(AUTHENTICATED_USER_ID);
        manager.commit(&logout).await?;

        stale.put(FLASH, "late write");
        assert!(manager.commit(&stale).await?.is_none());
        assert!(stale.token().is_none());
        assert_eq!(store.len().await, 1);

        let reloaded = manager.load(old_token.as_deref()).await?;
        assert!(reloaded.get::<i64>(AUTHENTICATED_USER_ID).is_none());
        assert!(reloaded.token().is_none());

        let current = manager.load(logout.token().as_deref()).await?;
        assert!(current.get::<i64>(AUTHENTICATED_USER_ID).is_none());
        assert!(current.get::<String>(FLASH).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn out_of_range_lifetime_is_an_error() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let manager = SessionManager::new(
            store.clone(),
            SessionConfig::new().with_lifetime_seconds(i64::MAX),
        );
        let session = manager.load(None).await?;
        session.put(FLASH, "hello");
        assert!(manager.commit(&session).await.is_err());
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn expired_token_behaves_like_absent() -> Result<()> {
        let (store, manager) = manager();
        let token = generate_session_token()?;
        let mut data = SessionData::new();
        data.insert(AUTHENTICATED_USER_ID.to_string(), Value::from(1));
        store
            .rotate(
                None,
                &hash_session_token(&token),
                &SessionRecord {
                    data,
                    expires_at: Utc::now() - chrono::Duration::seconds(1),
                },
            )
            .await?;

        let session = manager.load(Some(&token)).await?;
        assert!(session.token().is_none());
        assert!(session.get::<i64>(AUTHENTICATED_USER_ID).is_none());
        Ok(())
    }

    #[tokio::test]
    async fn malformed_token_starts_fresh_session() -> Result<()> {
        let (_store, manager) = manager();
        let session = manager.load(Some("garbage")).await?;
        assert!(session.token().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn destroy_deletes_record_and_clears_cookie() -> Result<()> {
        let (store, manager) = manager();
        let session = manager.load(None).await?;
        session.put(AUTHENTICATED_USER_ID, 3);
        manager.commit(&session).await?;
        let token = session.token();

        let loaded = manager.load(token.as_deref()).await?;
        loaded.destroy();
        let cookie = manager.commit(&loaded).await?;
        let cookie = cookie.map(|value| value.to_str().map(ToString::to_string));
        assert!(matches!(cookie, Some(Ok(ref value)) if value.contains("Max-Age=0")));
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn write_after_destroy_starts_new_session() -> Result<()> {
        let (store, manager) = manager();
        let session = manager.load(None).await?;
        session.put(FLASH, "a");
        manager.commit(&session).await?;
        let old_token = session.token();

        let loaded = manager.load(old_token.as_deref()).await?;
        loaded.destroy();
        loaded.put(FLASH, "b");
        assert!(manager.commit(&loaded).await?.is_some());
        assert_ne!(loaded.token(), old_token);
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn remove_missing_key_does_not_modify() -> Result<()> {
        let (store, manager) = manager();
        let session = manager.load(None).await?;
        session.remove(AUTHENTICATED_USER_ID);
        assert!(manager.commit(&session).await?.is_none());
        assert!(store.is_empty().await);
        Ok(())
    }

    #[test]
    fn config_defaults_to_twelve_hours() {
        let config = SessionConfig::new();
        assert_eq!(config.lifetime_seconds(), 12 * 60 * 60);
        assert!(!config.cookie_secure());
        let config = config.with_lifetime_seconds(60).with_cookie_secure(true);
        assert_eq!(config.lifetime_seconds(), 60);
        assert!(config.cookie_secure());
    }
}
