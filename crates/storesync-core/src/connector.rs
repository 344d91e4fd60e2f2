//! Store connector: the call surface used by the CLI and other front ends.
//!
//! Owns one validated [`ClientConfig`], one transport and one retry policy.
//! Every operation goes through the retry controller and the classifier.

use std::sync::Arc;

use indicatif::ProgressBar;
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::classify::transport_error;
use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorKind, SyncError};
use crate::model::{AttributeBag, Entity, FetchResult};
use crate::pagination::{decode_body, PageFetcher};
use crate::retry::RetryPolicy;
use crate::transport::{HttpTransport, Request, Transport};

/// Versions probed by [`Connector::detect_api_version`], newest first.
pub const PROBED_VERSIONS: [&str; 3] = ["v3", "v2", "v1"];

#[derive(Debug)]
pub struct Connector<T: Transport = HttpTransport> {
    config: Arc<ClientConfig>,
    transport: T,
    retry: RetryPolicy,
    cancel: CancelToken,
    progress: ProgressBar,
}

impl Connector<HttpTransport> {
    /// Validate `config` and build the HTTP transport. No request is sent.
    pub fn new(config: ClientConfig) -> Result<Self, SyncError> {
        config.validate()?;
        let config = Arc::new(config.normalized());
        let transport = HttpTransport::new(Arc::clone(&config))?;
        log::debug!("connector ready: {config:?}");
        Ok(Self::assemble(config, transport))
    }
}

impl<T: Transport> Connector<T> {
    /// Connector over a caller-supplied transport (scripted servers in tests).
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, SyncError> {
        config.validate()?;
        Ok(Self::assemble(Arc::new(config.normalized()), transport))
    }

    fn assemble(config: Arc<ClientConfig>, transport: T) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            config,
            transport,
            retry,
            cancel: CancelToken::new(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = pb;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Fetch every entity of `resource`, all pages or nothing.
    pub fn fetch_all_entities(
        &self,
        resource: &str,
        filters: &[(String, String)],
    ) -> Result<FetchResult, SyncError> {
        PageFetcher::new(&self.transport, self.retry.clone())
            .page_size(self.config.page_size)
            .inter_page_delay(self.config.inter_page_delay())
            .cancel_token(self.cancel.clone())
            .progress(self.progress.clone())
            .fetch_all(resource, filters)
    }

    /// Fetch one entity by id.
    pub fn fetch_entity(&self, resource: &str, id: i64) -> Result<Entity, SyncError> {
        let request = Request::get(format!("{}/{id}", resource.trim_matches('/')));
        let value = self.call(&request, &self.retry)?;
        Entity::from_json(value).map_err(|e| SyncError::Api {
            context: request.to_string(),
            source: ApiError::new(ErrorKind::MalformedResponse, None, e.to_string()),
        })
    }

    /// Store environment report (`system_status`), or the API index when
    /// that endpoint is unavailable.
    pub fn store_info(&self) -> Result<AttributeBag, SyncError> {
        self.store_document(&self.retry)
    }

    /// Single-attempt reachability probe. Never errors.
    pub fn health_check(&self) -> bool {
        match self.store_document(&RetryPolicy::none()) {
            Ok(_) => {
                log::info!("health check passed");
                true
            }
            Err(e) => {
                log::warn!("health check failed: {e}");
                false
            }
        }
    }

    /// First API version answering a one-item `products` request.
    ///
    /// Authentication and bot-protection failures end the probe early, since
    /// every version would be rejected the same way.
    pub fn detect_api_version(&self) -> Option<String> {
        log::info!("probing API versions {PROBED_VERSIONS:?}");
        for version in PROBED_VERSIONS {
            let request = Request::get("products")
                .query("per_page", 1)
                .version(version);
            match self.call(&request, &RetryPolicy::none()) {
                Ok(Value::Array(_)) => {
                    log::info!("API version {version} is available");
                    return Some(version.to_string());
                }
                Ok(_) => log::debug!("{version}: products did not return a list"),
                Err(e) => {
                    log::debug!("{version}: {e}");
                    if matches!(
                        e.api_kind(),
                        Some(ErrorKind::AuthenticationFailed | ErrorKind::BotProtectionBlocked)
                    ) {
                        log::warn!("version probe stopped: {e}");
                        return None;
                    }
                }
            }
        }
        log::warn!("no working API version found");
        None
    }

    fn store_document(&self, retry: &RetryPolicy) -> Result<AttributeBag, SyncError> {
        let value = match self.call(&Request::get("system_status"), retry) {
            Ok(v) => v,
            Err(e) if fallback_to_index(&e) => {
                log::debug!("system_status unavailable ({e}), using API index");
                self.call(&Request::get(""), retry)?
            }
            Err(e) => return Err(e),
        };
        match value {
            Value::Object(map) => Ok(AttributeBag::from_map(map)),
            _ => Err(SyncError::Api {
                context: "store info".to_string(),
                source: ApiError::new(
                    ErrorKind::MalformedResponse,
                    None,
                    "expected a JSON object",
                ),
            }),
        }
    }

    /// One request through `retry`, returning the parsed JSON body.
    fn call(&self, request: &Request, retry: &RetryPolicy) -> Result<Value, SyncError> {
        if self.cancel.is_cancelled() {
            return Err(SyncError::Cancelled {
                context: request.to_string(),
            });
        }
        let label = request.to_string();
        retry.execute(
            &label,
            request.method.is_idempotent(),
            &self.progress,
            |_| {
                let response = self
                    .transport
                    .send(request)
                    .map_err(|e| transport_error(&e))?;
                decode_body(&response)
            },
        )
    }
}

/// `system_status` needs elevated permissions on some stores.
fn fallback_to_index(err: &SyncError) -> bool {
    matches!(
        err.api_kind(),
        Some(ErrorKind::ResourceNotFound | ErrorKind::UnclassifiedApiError)
    )
}
