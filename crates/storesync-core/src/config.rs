//! Client configuration
//!
//! One immutable value holds everything a request needs (base URL,
//! credentials, identity header, limits). It is built once by the caller,
//! validated before any network call, and shared read-only afterwards.

use std::time::Duration;

use serde::Deserialize;

use crate::error::SyncError;

/// Desktop browser signature sent when no `user_agent` is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Upstream rejects `per_page` above this value.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Store URL, e.g. `https://shop.example.com`
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Path between the store URL and the version segment
    pub api_prefix: String,
    pub api_version: String,
    pub timeout_secs: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub user_agent: Option<String>,
    /// Send credentials as `consumer_key`/`consumer_secret` query parameters
    /// instead of an `Authorization: Basic` header
    pub query_string_auth: bool,
    pub page_size: u32,
    pub inter_page_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            api_prefix: "wp-json/wc".to_string(),
            api_version: "v3".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_delay_ms: 1000,
            user_agent: None,
            query_string_auth: true,
            page_size: MAX_PAGE_SIZE,
            inter_page_delay_ms: 0,
        }
    }
}

// Hand-written so credentials never reach logs through `{:?}`
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_prefix", &self.api_prefix)
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("user_agent", &self.user_agent)
            .field("query_string_auth", &self.query_string_auth)
            .field("page_size", &self.page_size)
            .field("inter_page_delay_ms", &self.inter_page_delay_ms)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Default::default()
        }
    }

    /// Check every field and report all problems at once.
    ///
    /// Trailing slashes on `base_url` are tolerated here and removed by
    /// [`ClientConfig::normalized`].
    pub fn validate(&self) -> Result<(), SyncError> {
        let mut problems = Vec::new();

        let url = self.base_url.trim();
        if url.is_empty() {
            problems.push("base_url is required".to_string());
        } else if !(url.starts_with("http://") || url.starts_with("https://")) {
            problems.push("base_url must start with http:// or https://".to_string());
        }

        for (name, value) in [("api_key", &self.api_key), ("api_secret", &self.api_secret)] {
            if value.is_empty() {
                problems.push(format!("{name} is required"));
            } else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
                problems.push(format!("{name} contains whitespace or control characters"));
            }
        }

        if self.api_version.trim_matches('/').is_empty() {
            problems.push("api_version must not be empty".to_string());
        }
        if self.timeout_secs == 0 {
            problems.push("timeout_secs must be positive".to_string());
        }
        if let Some(ua) = &self.user_agent {
            if ua.trim().is_empty() || ua.chars().any(|c| c.is_control()) {
                problems.push("user_agent must be a non-empty single line".to_string());
            }
        }

        if !problems.is_empty() {
            return Err(SyncError::ConfigurationInvalid { problems });
        }

        // WooCommerce keys carry these prefixes; other deployments may not.
        if !self.api_key.starts_with("ck_") {
            log::warn!("api_key does not start with 'ck_'");
        }
        if !self.api_secret.starts_with("cs_") {
            log::warn!("api_secret does not start with 'cs_'");
        }
        Ok(())
    }

    /// Copy with trimmed URL segments and the page size clamped to the API limit.
    pub fn normalized(&self) -> Self {
        let mut cfg = self.clone();
        cfg.base_url = cfg.base_url.trim().trim_end_matches('/').to_string();
        cfg.api_prefix = cfg.api_prefix.trim_matches('/').to_string();
        cfg.api_version = cfg.api_version.trim_matches('/').to_string();
        cfg.page_size = clamp_page_size(cfg.page_size);
        cfg
    }

    /// `{base_url}/{api_prefix}/{version}` without a trailing slash.
    pub fn api_root(&self, version: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        let version = version.trim_matches('/');
        if prefix.is_empty() {
            format!("{base}/{version}")
        } else {
            format!("{base}/{prefix}/{version}")
        }
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn inter_page_delay(&self) -> Duration {
        Duration::from_millis(self.inter_page_delay_ms)
    }
}

/// Clamp a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn clamp_page_size(requested: u32) -> u32 {
    if requested > MAX_PAGE_SIZE {
        log::warn!("page size {requested} exceeds API limit, using {MAX_PAGE_SIZE}");
        MAX_PAGE_SIZE
    } else {
        requested.max(1)
    }
}
