//! Bearer-token supplier interface.
//!
//! Callers fetch a token before building a request; the coordinator never
//! sees it and only observes whether the request succeeded.

use async_trait::async_trait;

/// Supplies the bearer token for outgoing requests.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns the current token, or `None` when signed out.
    async fn get_token(&self) -> Option<String>;
}

/// A provider that always returns the same token.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    /// An empty token counts as none.
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Adds an `Authorization` header when the provider has a token.
pub async fn authorize(
    request: reqwest::RequestBuilder,
    provider: &dyn TokenProvider,
) -> reqwest::RequestBuilder {
    match provider.get_token().await {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}
