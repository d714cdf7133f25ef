//! Inkdesk admin API client
//!
//! Every request picks up the bearer token from the shared [`TokenStore`]. A
//! 401 on an intercepted request hands control to the [`RefreshCoordinator`];
//! the original request is then resent exactly once with the new token.

pub mod auth;
pub mod cookies;
pub mod error;
pub mod refresh;

use cookies::StoredCookieJar;
use error::ClientError;
use inkdesk_core::{LoggingNavigator, Navigator, SessionEpoch, TokenStore};
use refresh::RefreshCoordinator;
use reqwest::{Client, ClientBuilder, Request, Response, StatusCode, header};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// How a request reacts to a 401
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    /// Refresh the session and resend once
    Refresh,
    /// Hand the 401 to the caller; used by the endpoints that establish
    /// credentials in the first place
    Passthrough,
}

/// Inkdesk API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<TokenStore>,
    refresh: Arc<RefreshCoordinator>,
}

impl ApiClient {
    /// Create a new client with default configuration and an in-memory store
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token store shared with the session layer
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Create a request builder; credentials are attached when it is sent
    pub fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Send a request with 401 recovery and return the successful response
    pub async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, ClientError> {
        self.dispatch(request, Interception::Refresh).await
    }

    /// Execute a request and deserialize the JSON body
    pub async fn execute<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        self.execute_with(request, Interception::Refresh).await
    }

    /// Execute a request and deserialize the JSON body, choosing how a 401 is
    /// handled
    pub async fn execute_with<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        interception: Interception,
    ) -> Result<T, ClientError> {
        let response = self.dispatch(request, interception).await?;
        Ok(response.json().await?)
    }

    /// Execute a request whose response body is ignored
    pub async fn execute_empty(
        &self,
        request: reqwest::RequestBuilder,
        interception: Interception,
    ) -> Result<(), ClientError> {
        self.dispatch(request, interception).await?;
        Ok(())
    }

    /// Send `request`, recovering from one expired access token when
    /// `interception` allows it.
    pub async fn dispatch(
        &self,
        request: reqwest::RequestBuilder,
        interception: Interception,
    ) -> Result<Response, ClientError> {
        let epoch = self.store.epoch();
        let request = request.build()?;
        // Streaming bodies cannot be replayed
        let replay = request.try_clone();
        let sent_with = self.store.access_token();

        let response = self.send_once(request, sent_with.as_deref(), &epoch).await?;
        if response.status() != StatusCode::UNAUTHORIZED || interception == Interception::Passthrough
        {
            return Self::check(response).await;
        }
        let Some(replay) = replay else {
            return Self::check(response).await;
        };
        if epoch.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        debug!(url = %response.url(), "Access token rejected, refreshing session");
        let token = self.refresh.refresh(sent_with.as_deref()).await?;

        // The replay is the single retry; a second 401 goes to the caller
        let response = self.send_once(replay, Some(&token), &epoch).await?;
        Self::check(response).await
    }

    async fn send_once(
        &self,
        mut request: Request,
        token: Option<&str>,
        epoch: &SessionEpoch,
    ) -> Result<Response, ClientError> {
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| ClientError::Configuration("access token is not a valid header".into()))?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }

        tokio::select! {
            biased;
            _ = epoch.cancellation().cancelled() => Err(ClientError::Cancelled),
            result = self.client.execute(request) => Ok(result?),
        }
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ClientError::from_body(status, &body))
        }
    }
}

/// Builder for ApiClient
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    store: Option<Arc<TokenStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Share a token store; defaults to an empty in-memory store
    pub fn store(mut self, store: Arc<TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Receiver of forced redirects; defaults to [`LoggingNavigator`]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "unsupported scheme in base_url: {}",
                parsed.scheme()
            )));
        }

        let store = self.store.unwrap_or_else(|| Arc::new(TokenStore::in_memory()));

        // The cookie jar carries the refresh token and lives next to the session
        let jar = StoredCookieJar::new(Arc::clone(store.storage()));
        let mut client_builder = ClientBuilder::new().cookie_provider(Arc::new(jar));

        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(user_agent) = self.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        } else {
            client_builder = client_builder.user_agent(concat!("inkdesk/", env!("CARGO_PKG_VERSION")));
        }

        let client = client_builder.build()?;
        let navigator = self
            .navigator
            .unwrap_or_else(|| Arc::new(LoggingNavigator));
        let refresh = Arc::new(RefreshCoordinator::new(
            client.clone(),
            &base_url,
            Arc::clone(&store),
            navigator,
        ));

        Ok(ApiClient {
            client,
            base_url,
            store,
            refresh,
        })
    }
}
