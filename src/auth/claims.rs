use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Claims carried in the access token payload.
///
/// Only `exp` and `csrfToken` are required; every other claim is kept in
/// `extra` untouched. The signature is not verified.
///
/// # Example
/// ```
/// use bearer_gate::auth::TokenClaims;
///
/// // {"exp":4102444800,"csrfToken":"c1"}
/// let token = "e30.eyJleHAiOjQxMDI0NDQ4MDAsImNzcmZUb2tlbiI6ImMxIn0.sig";
/// let claims = TokenClaims::decode(token)?;
/// assert_eq!(claims.csrf_token, "c1");
/// # Ok::<(), bearer_gate::error::AuthError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(rename = "csrfToken")]
    pub csrf_token: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TokenClaims {
    /// Decode the payload segment of a compact JWT.
    pub fn decode(token: &str) -> Result<Self> {
        let mut parts = token.trim().split('.');
        let _header = parts
            .next()
            .filter(|part| !part.is_empty())
            .ok_or_else(|| AuthError::Decode("missing JWT header".into()))?;
        let payload = parts
            .next()
            .filter(|part| !part.is_empty())
            .ok_or_else(|| AuthError::Decode("missing JWT payload".into()))?;
        // Some issuers keep the padding.
        let decoded = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| AuthError::Decode("invalid JWT payload encoding".into()))?;
        serde_json::from_slice(&decoded)
            .map_err(|err| AuthError::Decode(format!("invalid JWT claims: {err}")))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// True when `exp` is at or before `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    /// Look up any other claim by name.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }
}
