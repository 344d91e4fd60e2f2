//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use storesync_core::ClientConfig;

/// Global configuration for storesync
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub output: OutputConfig,
}

/// Store connection. Credentials accept `${VAR}` references.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub url: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub consumer_key: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub consumer_secret: Option<String>,
    pub api_version: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub user_agent: Option<String>,
    pub query_string_auth: bool,
    pub page_size: u32,
    pub inter_page_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let core = ClientConfig::default();
        Self {
            url: env_var("WC_URL"),
            consumer_key: env_var("WC_CONSUMER_KEY"),
            consumer_secret: env_var("WC_CONSUMER_SECRET"),
            api_version: env_var("WC_API_VERSION")
                .map(|v| strip_namespace(&v).to_string())
                .unwrap_or(core.api_version),
            timeout_secs: env_var("WC_TIMEOUT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(core.timeout_secs),
            max_retries: core.max_retries,
            retry_delay_ms: core.retry_delay_ms,
            user_agent: None,
            query_string_auth: core.query_string_auth,
            page_size: core.page_size,
            inter_page_delay_ms: 250,
        }
    }
}

// Hand-written so credentials stay out of `config` output and debug logs
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl StoreConfig {
    /// Client configuration with any missing credential filled from `WC_*`.
    pub fn to_client_config(&self) -> ClientConfig {
        let or_env = |value: &Option<String>, var: &str| {
            value.clone().or_else(|| env_var(var)).unwrap_or_default()
        };
        ClientConfig {
            base_url: or_env(&self.url, "WC_URL"),
            api_key: or_env(&self.consumer_key, "WC_CONSUMER_KEY"),
            api_secret: or_env(&self.consumer_secret, "WC_CONSUMER_SECRET"),
            api_version: strip_namespace(&self.api_version).to_string(),
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            retry_delay_ms: self.retry_delay_ms,
            user_agent: self.user_agent.clone(),
            query_string_auth: self.query_string_auth,
            page_size: self.page_size,
            inter_page_delay_ms: self.inter_page_delay_ms,
            ..ClientConfig::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_dir: PathBuf,
    /// Joins list values in one cell
    pub delimiter: String,
    pub uncategorized_title: String,
    pub max_column_width: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from("."),
            delimiter: ", ".to_string(),
            uncategorized_title: "Uncategorized".to_string(),
            max_column_width: 50,
        }
    }
}

/// `wc/v3` → `v3`; the namespace is part of the API prefix.
fn strip_namespace(version: &str) -> &str {
    version.trim_matches('/').rsplit('/').next().unwrap_or(version)
}

/// Non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./storesync.toml (current directory)
    /// 2. ~/.config/storesync/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("storesync.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "storesync") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
