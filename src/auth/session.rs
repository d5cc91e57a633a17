use std::fmt;

use serde::{Deserialize, Serialize};

use super::claims::TokenClaims;
use crate::error::Result;

/// Username/password pair posted to the login endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"..")
            .finish()
    }
}

/// Body returned by both the login and the refresh endpoint.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub refresh_token: String,
}

impl fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponse").finish_non_exhaustive()
    }
}

/// The active session.
///
/// Built only through [`Session::from_tokens`], so the CSRF claim always
/// comes from decoding `access_token`.
#[derive(Clone, PartialEq)]
pub struct Session {
    access_token: String,
    refresh_token: Option<String>,
    claims: TokenClaims,
}

impl Session {
    pub fn from_tokens(access_token: String, refresh_token: Option<String>) -> Result<Self> {
        let claims = TokenClaims::decode(&access_token)?;
        Ok(Self {
            access_token,
            refresh_token,
            claims,
        })
    }

    pub fn from_response(response: AuthResponse) -> Result<Self> {
        Self::from_tokens(response.token, Some(response.refresh_token))
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// `None` only for a session restored from storage without a refresh token.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn csrf_claim(&self) -> &str {
        &self.claims.csrf_token
    }

    pub fn claims(&self) -> &TokenClaims {
        &self.claims
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("exp", &self.claims.exp)
            .finish_non_exhaustive()
    }
}
