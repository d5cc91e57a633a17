//! Environment configuration (layered: preset > TOML file > env vars).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Default storage key for the access token.
pub const DEFAULT_TOKEN_STORAGE_KEY: &str = "auth_token";
/// Default storage key for the refresh token.
pub const DEFAULT_REFRESH_TOKEN_STORAGE_KEY: &str = "refresh_token";

const ENV_PRODUCTION: &str = "BEARER_GATE_PRODUCTION";
const ENV_API_URL: &str = "BEARER_GATE_API_URL";
const ENV_GOOGLE_CLIENT_ID: &str = "BEARER_GATE_GOOGLE_CLIENT_ID";
const ENV_GOOGLE_REDIRECT_URI: &str = "BEARER_GATE_GOOGLE_REDIRECT_URI";
const ENV_CSRF_ENABLED: &str = "BEARER_GATE_CSRF_ENABLED";
const ENV_TOKEN_STORAGE_KEY: &str = "BEARER_GATE_TOKEN_STORAGE_KEY";
const ENV_REFRESH_TOKEN_STORAGE_KEY: &str = "BEARER_GATE_REFRESH_TOKEN_STORAGE_KEY";

/// Application environment.
///
/// Two presets ship with the crate ([`Environment::development`] and
/// [`Environment::production`]). Either can be overridden from a TOML file or
/// from `BEARER_GATE_*` environment variables.
///
/// # Example
/// ```
/// use bearer_gate::config::Environment;
///
/// let env = Environment::development();
/// assert_eq!(env.api_url, "http://localhost:8080/api");
/// assert_eq!(env.security.token_storage_key, "auth_token");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Environment {
    pub production: bool,
    pub api_url: String,
    pub oauth: OAuthConfig,
    pub security: SecurityConfig,
}

/// OAuth client settings. Carried for the login surface; the token flow does
/// not read them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub google: GoogleOAuthConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
}

/// Token handling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Send `X-CSRF-Token` alongside the bearer credential.
    pub csrf_enabled: bool,
    pub token_storage_key: String,
    pub refresh_token_storage_key: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            csrf_enabled: true,
            token_storage_key: DEFAULT_TOKEN_STORAGE_KEY.to_string(),
            refresh_token_storage_key: DEFAULT_REFRESH_TOKEN_STORAGE_KEY.to_string(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::development()
    }
}

impl Environment {
    /// Local development preset.
    pub fn development() -> Self {
        Self {
            production: false,
            api_url: "http://localhost:8080/api".to_string(),
            oauth: OAuthConfig {
                google: GoogleOAuthConfig {
                    client_id: "your-google-client-id".to_string(),
                    redirect_uri: "http://localhost:4200/oauth2/callback".to_string(),
                },
            },
            security: SecurityConfig::default(),
        }
    }

    /// Production preset.
    pub fn production() -> Self {
        Self {
            production: true,
            api_url: "https://api.yourdomain.com/api".to_string(),
            oauth: OAuthConfig {
                google: GoogleOAuthConfig {
                    client_id: "production-google-client-id".to_string(),
                    redirect_uri: "https://yourdomain.com/oauth2/callback".to_string(),
                },
            },
            security: SecurityConfig::default(),
        }
    }

    /// Same environment, pointed at a different API base URL.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Load from environment variables (`BEARER_GATE_API_URL`, etc.).
    ///
    /// `BEARER_GATE_PRODUCTION` picks the starting preset; the remaining
    /// variables override individual fields.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let production = match std::env::var(ENV_PRODUCTION) {
            Ok(value) => parse_bool(ENV_PRODUCTION, &value)?,
            Err(_) => false,
        };
        let base = if production {
            Self::production()
        } else {
            Self::development()
        };
        base.apply_env()
    }

    /// Apply `BEARER_GATE_*` overrides on top of `self`.
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            self.api_url = url;
        }
        if let Ok(id) = std::env::var(ENV_GOOGLE_CLIENT_ID) {
            self.oauth.google.client_id = id;
        }
        if let Ok(uri) = std::env::var(ENV_GOOGLE_REDIRECT_URI) {
            self.oauth.google.redirect_uri = uri;
        }
        if let Ok(value) = std::env::var(ENV_CSRF_ENABLED) {
            self.security.csrf_enabled = parse_bool(ENV_CSRF_ENABLED, &value)?;
        }
        if let Ok(key) = std::env::var(ENV_TOKEN_STORAGE_KEY) {
            self.security.token_storage_key = key;
        }
        if let Ok(key) = std::env::var(ENV_REFRESH_TOKEN_STORAGE_KEY) {
            self.security.refresh_token_storage_key = key;
        }
        self.validate()?;
        Ok(self)
    }

    /// Parse a TOML document. Missing fields fall back to the development preset.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let env: Self = toml::from_str(raw)?;
        env.validate()?;
        Ok(env)
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AuthError::Configuration(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reject configurations the token flow cannot work with.
    pub fn validate(&self) -> Result<()> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(AuthError::Configuration("api_url is empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AuthError::Configuration(format!(
                "api_url must be http(s): {url}"
            )));
        }
        let security = &self.security;
        if security.token_storage_key.is_empty() || security.refresh_token_storage_key.is_empty()
        {
            return Err(AuthError::Configuration(
                "storage keys must not be empty".to_string(),
            ));
        }
        if security.token_storage_key == security.refresh_token_storage_key {
            return Err(AuthError::Configuration(format!(
                "token and refresh token share storage key {}",
                security.token_storage_key
            )));
        }
        Ok(())
    }

    /// `api_url` joined with `path`, without doubled slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AuthError::Configuration(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}
