#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bearer_gate::auth::{KeyValueStorage, MemoryStorage, TokenSource, TokenStore};
use bearer_gate::config::Environment;
use bearer_gate::error::{AuthError, Result};
use bearer_gate::gateway::Navigator;
use serde_json::json;
use wiremock::MockServer;

/// 2100-01-01T00:00:00Z
pub const FAR_FUTURE: i64 = 4_102_444_800;

/// Unsigned compact JWT with the given expiry and CSRF claim.
pub fn jwt(exp: i64, csrf: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = json!({"exp": exp, "csrfToken": csrf, "sub": "u1"});
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub fn env_for(server: &MockServer) -> Environment {
    Environment::development().with_api_url(format!("{}/api", server.uri()))
}

/// Storage already holding a live session.
pub fn seeded_storage(access: &str, refresh: &str) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_item("auth_token", access).expect("seed token");
    storage.set_item("refresh_token", refresh).expect("seed refresh");
    storage
}

/// Delegates to a [`TokenStore`] and counts refresh/logout calls.
pub struct CountingSource {
    pub inner: Arc<TokenStore>,
    pub refreshes: AtomicUsize,
    pub logouts: AtomicUsize,
}

impl CountingSource {
    pub fn new(inner: Arc<TokenStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            refreshes: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
        })
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn logout_count(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenSource for CountingSource {
    fn token(&self) -> Option<String> {
        self.inner.get_token()
    }

    fn csrf_token(&self) -> Option<String> {
        self.inner.get_csrf_token()
    }

    async fn refresh_token(&self) -> Result<String> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.inner.refresh_token().await
    }

    fn logout(&self) -> Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        self.inner.logout()
    }
}

/// Records every route it is sent to.
#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn routes(&self) -> Vec<String> {
        self.routes.lock().expect("navigator lock poisoned").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes
            .lock()
            .expect("navigator lock poisoned")
            .push(route.to_string());
    }
}

/// In-memory storage whose writes of one exact key/value pair fail.
#[derive(Default)]
pub struct FailingStorage {
    pub inner: MemoryStorage,
    fail_on: Mutex<Option<(String, String)>>,
}

impl FailingStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes_of(&self, key: &str, value: &str) {
        *self.fail_on.lock().expect("fail_on lock poisoned") =
            Some((key.to_string(), value.to_string()));
    }
}

impl KeyValueStorage for FailingStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let fail_on = self.fail_on.lock().expect("fail_on lock poisoned").clone();
        if fail_on.is_some_and(|(k, v)| k == key && v == value) {
            return Err(AuthError::Storage("disk full".to_string()));
        }
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.inner.remove_item(key)
    }
}
