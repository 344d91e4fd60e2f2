//! HTTP transport for the store REST API.
//!
//! Uses async reqwest internally on a shared tokio runtime but presents a
//! sync interface, so pagination and retry read as plain loops. Must not be
//! called from inside another tokio runtime.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;

use crate::config::ClientConfig;
use crate::error::SyncError;

/// Connect timeout ceiling; the overall request timeout comes from config
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Response headers carrying collection totals, in lookup order.
const TOTAL_HEADERS: [&str; 2] = ["x-wp-total", "x-total"];
const TOTAL_PAGES_HEADERS: [&str; 2] = ["x-wp-totalpages", "x-total-pages"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// POST creates a new resource on every call; the others can be replayed.
    pub fn is_idempotent(self) -> bool {
        !matches!(self, Self::Post)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

/// One API call, relative to the configured API root.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Resource path, e.g. `products` or `products/42`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    /// Overrides the configured version segment (used by version probing)
    pub api_version: Option<String>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            api_version: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method.as_str(), self.path)?;
        for (i, (k, v)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{sep}{k}={v}")?;
        }
        Ok(())
    }
}

/// Collection totals advertised by the server, if any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageHints {
    pub total: Option<u64>,
    pub total_pages: Option<u32>,
}

impl PageHints {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            total: first_numeric(headers, &TOTAL_HEADERS),
            total_pages: first_numeric(headers, &TOTAL_PAGES_HEADERS),
        }
    }
}

fn first_numeric<T: std::str::FromStr>(headers: &HeaderMap, names: &[&str]) -> Option<T> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    })
}

/// Response as received, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub hints: PageHints,
    pub body: String,
}

/// Failure before any HTTP status was received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Convert from reqwest, dropping the URL (it carries query-string credentials).
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        let timeout = e.is_timeout();
        let connect = e.is_connect();
        let message = e.without_url().to_string();
        if timeout {
            Self::Timeout(message)
        } else if connect {
            Self::Connect(message)
        } else {
            Self::Other(message)
        }
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations hold no per-request state; the retry controller may call
/// `send` repeatedly with the same request.
pub trait Transport {
    fn send(&self, request: &Request) -> Result<RawResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
        (**self).send(request)
    }
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// reqwest-backed transport bound to one immutable [`ClientConfig`].
pub struct HttpTransport {
    client: reqwest::Client,
    config: Arc<ClientConfig>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(config: Arc<ClientConfig>) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        let agent = HeaderValue::from_str(config.user_agent())
            .map_err(|e| SyncError::config(format!("invalid user_agent: {e}")))?;
        headers.insert(header::USER_AGENT, agent);

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(CONNECT_TIMEOUT))
            .default_headers(headers)
            .build()
            .map_err(|e| SyncError::config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, request: &Request) -> String {
        let version = request
            .api_version
            .as_deref()
            .unwrap_or(&self.config.api_version);
        let root = self.config.api_root(version);
        let path = request.path.trim_matches('/');
        if path.is_empty() {
            format!("{root}/")
        } else {
            format!("{root}/{path}")
        }
    }

    fn build(&self, request: &Request) -> Result<reqwest::RequestBuilder, TransportError> {
        let mut builder = self
            .client
            .request(request.method.as_reqwest(), self.url(request))
            .query(&request.query);

        let cfg = &self.config;
        builder = if cfg.query_string_auth {
            builder.query(&[
                ("consumer_key", cfg.api_key.as_str()),
                ("consumer_secret", cfg.api_secret.as_str()),
            ])
        } else {
            builder.basic_auth(&cfg.api_key, Some(&cfg.api_secret))
        };

        if let Some(body) = &request.body {
            let bytes = serde_json::to_vec(body)
                .map_err(|e| TransportError::Other(format!("cannot encode body: {e}")))?;
            builder = builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(bytes);
        }
        Ok(builder)
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
        log::debug!("{request}");
        let builder = self.build(request)?;

        SHARED_RUNTIME.handle().block_on(async {
            let response = builder.send().await.map_err(TransportError::from_reqwest)?;
            let status = response.status().as_u16();
            let hints = PageHints::from_headers(response.headers());
            let body = response.text().await.map_err(TransportError::from_reqwest)?;
            Ok(RawResponse {
                status,
                hints,
                body,
            })
        })
    }
}
