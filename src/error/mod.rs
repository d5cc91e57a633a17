//! Error types for bearer-gate.

use thiserror::Error;

/// Primary error type for all bearer-gate operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The login endpoint rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The refresh token was missing or rejected, or the refresh call failed.
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// Non-success HTTP status that is not handled by the refresh path.
    #[error("Transport error (status {status}): {body}")]
    Transport { status: u16, body: String },

    #[error("Token decode error: {0}")]
    Decode(String),

    /// A credential could not be placed in an HTTP header.
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    /// Build a transport error from a status code and response body.
    pub fn transport(status: u16, body: impl Into<String>) -> Self {
        Self::Transport {
            status,
            body: body.into(),
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            Self::Network(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error is an HTTP 401.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Configuration(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Storage(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AuthError>;
