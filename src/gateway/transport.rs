use async_trait::async_trait;
use reqwest::{Request, Response};

/// Sends a fully built request. `reqwest::Client` is the default.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl Transport for reqwest::Client {
    async fn send(&self, request: Request) -> reqwest::Result<Response> {
        self.execute(request).await
    }
}

/// Receives the "go to login" signal after a failed refresh.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, route: &str) {
        self(route)
    }
}

/// Navigator for headless callers; drops the signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, route: &str) {
        tracing::debug!(route, "navigation requested with no navigator attached");
    }
}
