// ReadHub Core - Book catalog client data layer
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! HTTP client for the book service
//!
//! This module provides the outbound adapter every backend call goes through:
//! - Bearer token attached when the session holds one (anonymous otherwise)
//! - 401 responses clear the stored token and fire the unauthorized callback
//! - Fixed request timeout, surfaced as `TransportError::Timeout`
//! - Transport failures normalized into `CatalogError`
//!
//! # Retry Strategy
//! The adapter never retries. Retry policy lives in the cache layer
//! (`cache::policy::RetryPolicy`) so there is exactly one policy in play.
//!
//! # Architecture
//! `HttpTransport` is the seam between typed endpoints (`api::books`) and the
//! wire. `HttpClient` implements it on top of `reqwest::Client`; tests plug in
//! scripted transports.

use crate::config::ClientConfig;
use crate::error::{ApiError, CatalogError, Result, TransportError};
use crate::storage::Session;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Callback invoked after a 401 cleared the token (e.g. navigate to login)
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

/// Transport-agnostic description of one backend call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new<S: Into<String>>(method: Method, path: S) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get<S: Into<String>>(path: S) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post<S: Into<String>>(path: S) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put<S: Into<String>>(path: S) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete<S: Into<String>>(path: S) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of a query parameter, if present
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Anything that can execute an `ApiRequest` and hand back the JSON body
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one request. Never retries.
    async fn send(&self, request: ApiRequest) -> Result<Value>;
}

/// reqwest-backed transport for the book service
pub struct HttpClient {
    /// Underlying HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
    /// Identity context (token source)
    session: Arc<Session>,
    /// Side effect fired after a 401
    on_unauthorized: Option<UnauthorizedHandler>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("has_token", &self.session.has_token())
            .field("on_unauthorized", &self.on_unauthorized.is_some())
            .finish()
    }
}

impl HttpClient {
    /// Create a client with default configuration
    pub fn new(session: Arc<Session>) -> Result<Self> {
        Self::with_config(&ClientConfig::default(), session)
    }

    /// Create a client with custom configuration
    ///
    /// # Errors
    /// Returns error if the configuration is invalid or the HTTP client cannot be built
    pub fn with_config(config: &ClientConfig, session: Arc<Session>) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).map_err(|e| {
                CatalogError::InvalidConfiguration(format!("Invalid user agent: {}", e))
            })?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            on_unauthorized: None,
        })
    }

    /// Register the callback fired after a 401 cleared the token
    pub fn on_unauthorized<F>(mut self, handler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_unauthorized = Some(Arc::new(handler));
        self
    }

    /// Get the API base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Clear the token and signal that authentication is required
    async fn handle_unauthorized(&self) {
        warn!("Received 401 from book service, clearing stored token");
        if let Err(e) = self.session.clear_token().await {
            warn!(error = %e, "Failed to clear stored token");
        }
        if let Some(handler) = &self.on_unauthorized {
            handler();
        }
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, path = %request.path, "Dispatching request");

        let mut builder = self.client.request(request.method.clone(), &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = self.session.token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            let err = CatalogError::from(e);
            debug!(path = %request.path, error = %err, "Request failed before a response arrived");
            err
        })?;

        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            self.handle_unauthorized().await;
        }

        if !status.is_success() {
            debug!(path = %request.path, status = status.as_u16(), "Request returned error status");
            return Err(status_error(status, &body));
        }

        decode_body(&body)
    }
}

/// Build the error for a non-success response
///
/// The server's `{statusCode, timestamp, message, description}` body is
/// kept verbatim when present.
pub fn status_error(status: StatusCode, body: &str) -> CatalogError {
    let api_error = ApiError::from_body(Some(status.as_u16()), body, status.canonical_reason());
    CatalogError::Transport(TransportError::HttpStatus {
        status: status.as_u16(),
        api_error,
    })
}

/// Parse a success body; empty bodies (e.g. DELETE) become `Value::Null`
pub fn decode_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str::<Value>(body).map_err(|e| {
        // Keep a window of the body around the failure for debugging
        let error_col = e.column();
        let start = floor_char_boundary(body, error_col.saturating_sub(200));
        let end = floor_char_boundary(body, (error_col + 200).min(body.len()));
        CatalogError::integrity(format!(
            "Response is not valid JSON: {} at col {}. Context: ...{}...",
            e,
            error_col,
            &body[start..end]
        ))
    })
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
