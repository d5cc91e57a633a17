//! Authenticated request dispatch with a single refresh-and-retry on 401.

pub mod transport;

pub use transport::{Navigator, NoopNavigator, Transport};

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::auth::TokenSource;
use crate::config::Environment;
use crate::error::{AuthError, Result};

/// Header carrying the CSRF claim.
pub const CSRF_HEADER: &str = "x-csrf-token";
/// Route handed to the [`Navigator`] after a failed refresh.
pub const LOGIN_ROUTE: &str = "/login";

/// Where a single dispatched request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchState {
    Sending,
    Unauthorized,
    Refreshing,
    Retrying,
    LoggedOut,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sending => "sending",
            Self::Unauthorized => "unauthorized",
            Self::Refreshing => "refreshing",
            Self::Retrying => "retrying",
            Self::LoggedOut => "logged_out",
        };
        f.write_str(name)
    }
}

/// Wraps a [`Transport`] and injects the current credentials.
///
/// On a 401 the gateway asks its [`TokenSource`] for a fresh token and
/// retries the original request exactly once. If the refresh fails, the
/// session is dropped, the [`Navigator`] is sent to the login route and the
/// refresh error is returned.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use bearer_gate::auth::{MemoryStorage, TokenStore};
/// use bearer_gate::config::Environment;
/// use bearer_gate::gateway::AuthGateway;
///
/// # async fn example() -> bearer_gate::error::Result<()> {
/// let env = Environment::development();
/// let store = Arc::new(TokenStore::new(&env, Arc::new(MemoryStorage::new())));
/// let gateway = AuthGateway::new(&env, store)
///     .with_navigator(Arc::new(|route: &str| println!("redirect to {route}")));
/// let profile: serde_json::Value = gateway.get_json("users/me").await?;
/// # Ok(())
/// # }
/// ```
pub struct AuthGateway {
    tokens: Arc<dyn TokenSource>,
    client: reqwest::Client,
    transport: Arc<dyn Transport>,
    navigator: Arc<dyn Navigator>,
    env: Environment,
    login_route: String,
}

impl AuthGateway {
    pub fn new(env: &Environment, tokens: Arc<dyn TokenSource>) -> Self {
        let client = reqwest::Client::new();
        Self {
            tokens,
            transport: Arc::new(client.clone()),
            client,
            navigator: Arc::new(NoopNavigator),
            env: env.clone(),
            login_route: LOGIN_ROUTE.to_string(),
        }
    }

    /// Use `client` both to build requests and to send them.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.transport = Arc::new(client.clone());
        self.client = client;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    /// Start a request against `api_url`/`path`.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.env.endpoint(path))
    }

    /// Build and dispatch.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        self.dispatch(builder.build()?).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.dispatch_json(self.request(Method::GET, path).build()?).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path).json(body).build()?;
        self.dispatch_json(request).await
    }

    /// Dispatch and decode a JSON response body.
    pub async fn dispatch_json<T: DeserializeOwned>(&self, request: Request) -> Result<T> {
        let response = self.dispatch(request).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Send `request` with credentials attached.
    ///
    /// Success responses come back as-is. A 401 goes through one
    /// refresh-and-retry cycle; every other failure status becomes
    /// [`AuthError::Transport`].
    pub async fn dispatch(&self, request: Request) -> Result<Response> {
        let url = request.url().to_string();
        // Undecorated copy for the retry; `None` for streaming bodies.
        let template = request.try_clone();

        let mut request = request;
        if let Some(token) = self.tokens.token() {
            self.decorate(&mut request, &token)?;
        }
        trace_state(&url, DispatchState::Sending);
        let response = self.transport.send(request).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }
        trace_state(&url, DispatchState::Unauthorized);

        let Some(original) = template else {
            warn!(url = url.as_str(), "request body cannot be replayed, skipping refresh");
            return Err(into_transport_error(response).await);
        };

        trace_state(&url, DispatchState::Refreshing);
        match self.tokens.refresh_token().await {
            Ok(token) => {
                let mut retry = original;
                self.decorate(&mut retry, &token)?;
                trace_state(&url, DispatchState::Retrying);
                let response = self.transport.send(retry).await?;
                check_status(response).await
            }
            Err(err) => {
                warn!(url = url.as_str(), error = %err, "token refresh failed, logging out");
                if let Err(logout_err) = self.tokens.logout() {
                    warn!(error = %logout_err, "logout after failed refresh did not clear storage");
                }
                trace_state(&url, DispatchState::LoggedOut);
                self.navigator.navigate(&self.login_route);
                Err(err)
            }
        }
    }

    fn decorate(&self, request: &mut Request, token: &str) -> Result<()> {
        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            sensitive_value(AUTHORIZATION.as_str(), &format!("Bearer {token}"))?,
        );
        if self.env.security.csrf_enabled {
            if let Some(csrf) = self.tokens.csrf_token() {
                headers.insert(
                    HeaderName::from_static(CSRF_HEADER),
                    sensitive_value(CSRF_HEADER, &csrf)?,
                );
            }
        }
        Ok(())
    }
}

fn sensitive_value(header: &str, raw: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(raw).map_err(|_| {
        AuthError::InvalidHeader(format!("{header} contains characters not allowed in a header"))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

fn trace_state(url: &str, state: DispatchState) {
    debug!(url, state = %state, "dispatch");
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(into_transport_error(response).await);
    }
    Ok(response)
}

async fn into_transport_error(response: Response) -> AuthError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    AuthError::transport(status, body)
}
