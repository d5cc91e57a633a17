use reqwest::StatusCode;
use serde::Serialize;
use tracing::debug;

use super::session::{AuthResponse, Credentials};
use crate::config::Environment;
use crate::error::{AuthError, Result};

const LOGIN_PATH: &str = "auth/login";
const REFRESH_PATH: &str = "auth/refresh";

/// HTTP client for the login and refresh endpoints.
///
/// # Example
/// ```no_run
/// use bearer_gate::auth::{AuthApi, Credentials};
/// use bearer_gate::config::Environment;
///
/// # async fn example() -> bearer_gate::error::Result<()> {
/// let api = AuthApi::new(&Environment::development());
/// let response = api.login(&Credentials::new("u", "p")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: reqwest::Client,
    login_url: String,
    refresh_url: String,
}

impl AuthApi {
    pub fn new(env: &Environment) -> Self {
        Self {
            client: reqwest::Client::new(),
            login_url: env.endpoint(LOGIN_PATH),
            refresh_url: env.endpoint(REFRESH_PATH),
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    pub fn with_refresh_url(mut self, url: impl Into<String>) -> Self {
        self.refresh_url = url.into();
        self
    }

    /// `POST /auth/login`. 401 and 403 mean the credentials were rejected.
    pub async fn login(&self, credentials: &Credentials) -> Result<AuthResponse> {
        debug!(
            url = self.login_url.as_str(),
            username = credentials.username.as_str(),
            "login request"
        );
        let resp = self
            .client
            .post(&self.login_url)
            .header("Accept", "application/json")
            .json(credentials)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::Authentication(error_message(status, &body)));
        }
        if !status.is_success() {
            return Err(AuthError::transport(status.as_u16(), body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// `POST /auth/refresh` with the stored refresh token.
    ///
    /// Every failure, including network errors and malformed bodies, comes
    /// back as [`AuthError::Refresh`].
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse> {
        debug!(url = self.refresh_url.as_str(), "refresh request");
        let resp = self
            .client
            .post(&self.refresh_url)
            .header("Accept", "application/json")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|err| AuthError::Refresh(format!("refresh request failed: {err}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| AuthError::Refresh(format!("refresh body unreadable: {err}")))?;
        if !status.is_success() {
            return Err(AuthError::Refresh(error_message(status, &body)));
        }
        serde_json::from_str(&body)
            .map_err(|err| AuthError::Refresh(format!("invalid refresh response: {err}")))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Prefer a JSON `message`/`error` field over the raw body.
fn error_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {detail}", status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_json_message() {
        let msg = error_message(StatusCode::UNAUTHORIZED, r#"{"message":"bad password"}"#);
        assert_eq!(msg, "status 401: bad password");
    }

    #[test]
    fn error_message_falls_back_to_body_then_status() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, " nope "),
            "status 400: nope"
        );
        assert_eq!(error_message(StatusCode::FORBIDDEN, ""), "status 403");
    }

    #[test]
    fn refresh_request_uses_camel_case() {
        let body = serde_json::to_value(RefreshRequest { refresh_token: "r1" }).unwrap();
        assert_eq!(body, serde_json::json!({"refreshToken": "r1"}));
    }
}
