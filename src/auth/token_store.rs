use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::api::AuthApi;
use super::claims::TokenClaims;
use super::session::{Credentials, Session};
use super::storage::KeyValueStorage;
use crate::config::Environment;
use crate::error::{AuthError, Result};

/// What the request gateway needs from a session owner.
///
/// [`TokenStore`] is the production implementation; the trait exists so the
/// gateway can be driven by any shared session holder.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current access token.
    fn token(&self) -> Option<String>;
    /// Current CSRF claim.
    fn csrf_token(&self) -> Option<String>;
    /// Exchange the refresh token for a new session, returning the new access token.
    async fn refresh_token(&self) -> Result<String>;
    /// Drop the session. Idempotent.
    fn logout(&self) -> Result<()>;
}

/// Owner of the active session.
///
/// Holds the session in memory, mirrors it to durable storage and publishes
/// the current access token through a [`watch`] channel. Every mutation goes
/// through `login`, `refresh_token` or `logout`.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use bearer_gate::auth::{Credentials, MemoryStorage, TokenStore};
/// use bearer_gate::config::Environment;
///
/// # async fn example() -> bearer_gate::error::Result<()> {
/// let store = TokenStore::new(&Environment::development(), Arc::new(MemoryStorage::new()));
/// let mut updates = store.subscribe();
/// store.login(&Credentials::new("u", "p")).await?;
/// assert!(updates.borrow_and_update().is_some());
/// # Ok(())
/// # }
/// ```
pub struct TokenStore {
    api: AuthApi,
    storage: Arc<dyn KeyValueStorage>,
    token_key: String,
    refresh_key: String,
    session: RwLock<Option<Session>>,
    token_tx: watch::Sender<Option<String>>,
}

impl TokenStore {
    /// Build a store talking to `env.api_url` and hydrate it from `storage`.
    pub fn new(env: &Environment, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_api(env, AuthApi::new(env), storage)
    }

    /// Build a store with a preconfigured [`AuthApi`].
    pub fn with_api(env: &Environment, api: AuthApi, storage: Arc<dyn KeyValueStorage>) -> Self {
        let (token_tx, _) = watch::channel(None);
        let store = Self {
            api,
            storage,
            token_key: env.security.token_storage_key.clone(),
            refresh_key: env.security.refresh_token_storage_key.clone(),
            session: RwLock::new(None),
            token_tx,
        };
        store.hydrate();
        store
    }

    /// Best-effort restore from storage. A token that does not decode is
    /// removed so the CSRF claim never goes missing next to a live token.
    fn hydrate(&self) {
        let stored = match self.storage.get_item(&self.token_key) {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(err) => {
                warn!(error = %err, "could not read stored session");
                return;
            }
        };
        let refresh = self.storage.get_item(&self.refresh_key).unwrap_or_else(|err| {
            warn!(error = %err, "could not read stored refresh token");
            None
        });
        match Session::from_tokens(stored, refresh) {
            Ok(session) => {
                debug!(exp = session.claims().exp, "restored session from storage");
                self.replace(Some(session));
            }
            Err(err) => {
                warn!(error = %err, "discarding malformed stored token");
                if let Err(err) = self.clear_storage() {
                    warn!(error = %err, "could not clear malformed stored token");
                }
            }
        }
    }

    pub fn get_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.access_token().to_string())
    }

    pub fn get_csrf_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.csrf_claim().to_string())
    }

    /// Snapshot of the active session.
    pub fn session(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn claims(&self) -> Option<TokenClaims> {
        self.read().as_ref().map(|s| s.claims().clone())
    }

    /// Receiver that always holds the current access token.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token_tx.subscribe()
    }

    /// True with no session, or when `exp` is at or before now.
    pub fn is_token_expired(&self) -> bool {
        self.is_token_expired_at(Utc::now())
    }

    pub fn is_token_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.read().as_ref() {
            Some(session) => session.claims().is_expired_at(now),
            None => true,
        }
    }

    /// Authenticate against `/auth/login` and make the result the active session.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let response = self.api.login(credentials).await?;
        let session = Session::from_response(response)?;
        self.set_session(session.clone())?;
        info!(username = credentials.username.as_str(), "logged in");
        Ok(session)
    }

    /// Exchange the stored refresh token for a new session.
    pub async fn refresh_token(&self) -> Result<String> {
        let refresh = self
            .read()
            .as_ref()
            .and_then(|s| s.refresh_token().map(str::to_string))
            .ok_or_else(|| AuthError::Refresh("no refresh token stored".to_string()))?;
        let response = self.api.refresh(&refresh).await?;
        let session = Session::from_response(response)
            .map_err(|err| AuthError::Refresh(format!("refreshed token unusable: {err}")))?;
        let token = session.access_token().to_string();
        self.set_session(session).map_err(|err| {
            AuthError::Refresh(format!("refreshed session could not be stored: {err}"))
        })?;
        info!("session refreshed");
        Ok(token)
    }

    /// Clear the session in memory and in storage, then notify subscribers.
    ///
    /// Memory is cleared even when storage fails, so `get_token()` is `None`
    /// afterwards in every case.
    pub fn logout(&self) -> Result<()> {
        let had_session = self.replace(None);
        if had_session {
            info!("logged out");
        }
        self.clear_storage()
    }

    /// Persist then publish. A failed write restores the previously stored
    /// pair, or clears both keys if that fails too, so storage never holds a
    /// token from one session next to a refresh token from another.
    fn set_session(&self, session: Session) -> Result<()> {
        if let Err(err) = self.persist(&session) {
            let restored = match self.session() {
                Some(previous) => self.persist(&previous),
                None => self.clear_storage(),
            };
            if let Err(restore_err) = restored {
                warn!(error = %restore_err, "could not restore stored session, clearing it");
                if let Err(clear_err) = self.clear_storage() {
                    warn!(error = %clear_err, "could not clear stored session");
                }
            }
            return Err(err);
        }
        self.replace(Some(session));
        Ok(())
    }

    fn persist(&self, session: &Session) -> Result<()> {
        self.storage
            .set_item(&self.token_key, session.access_token())?;
        match session.refresh_token() {
            Some(refresh) => self.storage.set_item(&self.refresh_key, refresh),
            None => self.storage.remove_item(&self.refresh_key),
        }
    }

    /// Swap the session and publish the new token. Returns whether a session
    /// was active before.
    fn replace(&self, session: Option<Session>) -> bool {
        let token = session.as_ref().map(|s| s.access_token().to_string());
        let mut guard = self.write();
        let previous = std::mem::replace(&mut *guard, session);
        self.token_tx.send_replace(token);
        previous.is_some()
    }

    fn clear_storage(&self) -> Result<()> {
        self.storage.remove_item(&self.token_key)?;
        self.storage.remove_item(&self.refresh_key)
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.session
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.session
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TokenSource for TokenStore {
    fn token(&self) -> Option<String> {
        self.get_token()
    }

    fn csrf_token(&self) -> Option<String> {
        self.get_csrf_token()
    }

    async fn refresh_token(&self) -> Result<String> {
        TokenStore::refresh_token(self).await
    }

    fn logout(&self) -> Result<()> {
        TokenStore::logout(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::MemoryStorage;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use chrono::TimeZone;

    fn jwt(exp: i64, csrf: &str) -> String {
        let payload = serde_json::json!({"exp": exp, "csrfToken": csrf}).to_string();
        format!("e30.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    fn store_with(storage: Arc<MemoryStorage>) -> TokenStore {
        TokenStore::new(&Environment::development(), storage)
    }

    #[test]
    fn empty_store_has_no_token_and_is_expired() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        assert_eq!(store.get_token(), None);
        assert_eq!(store.get_csrf_token(), None);
        assert!(store.is_token_expired());
        assert_eq!(*store.subscribe().borrow(), None);
    }

    #[test]
    fn hydrates_token_and_csrf_from_storage() {
        let storage = Arc::new(MemoryStorage::new());
        let token = jwt(4_102_444_800, "csrf-h");
        storage.set_item("auth_token", &token).unwrap();
        storage.set_item("refresh_token", "r-h").unwrap();

        let store = store_with(storage);
        assert_eq!(store.get_token(), Some(token.clone()));
        assert_eq!(store.get_csrf_token().as_deref(), Some("csrf-h"));
        assert_eq!(*store.subscribe().borrow(), Some(token));
        assert_eq!(
            store.session().unwrap().refresh_token(),
            Some("r-h")
        );
    }

    #[test]
    fn hydration_discards_malformed_token() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("auth_token", "not-a-jwt").unwrap();
        storage.set_item("refresh_token", "r").unwrap();

        let store = store_with(storage.clone());
        assert_eq!(store.get_token(), None);
        assert!(storage.is_empty());
    }

    #[test]
    fn expiry_uses_exp_claim() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("auth_token", &jwt(1_000, "c")).unwrap();
        let store = store_with(storage);

        assert!(store.is_token_expired_at(Utc.timestamp_opt(1_000, 0).unwrap()));
        assert!(!store.is_token_expired_at(Utc.timestamp_opt(999, 0).unwrap()));
        assert!(store.is_token_expired());
    }

    #[test]
    fn logout_is_idempotent_and_notifies() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("auth_token", &jwt(4_102_444_800, "c")).unwrap();
        storage.set_item("refresh_token", "r").unwrap();
        let store = store_with(storage.clone());
        let mut rx = store.subscribe();
        rx.borrow_and_update();

        store.logout().unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), None);
        store.logout().unwrap();

        assert_eq!(store.get_token(), None);
        assert_eq!(store.get_csrf_token(), None);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_fails_without_network() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("auth_token", &jwt(4_102_444_800, "c")).unwrap();
        let store = TokenStore::with_api(
            &Environment::development(),
            AuthApi::new(&Environment::development())
                .with_refresh_url("http://127.0.0.1:9/unreachable"),
            storage,
        );
        let err = store.refresh_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Refresh(msg) if msg.contains("no refresh token")));
    }

    #[test]
    fn custom_storage_keys_are_honoured() {
        let mut env = Environment::development();
        env.security.token_storage_key = "t".to_string();
        env.security.refresh_token_storage_key = "rt".to_string();
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item("t", &jwt(4_102_444_800, "c")).unwrap();
        storage.set_item("auth_token", "ignored").unwrap();

        let store = TokenStore::new(&env, storage);
        assert_eq!(store.get_csrf_token().as_deref(), Some("c"));
    }
}
