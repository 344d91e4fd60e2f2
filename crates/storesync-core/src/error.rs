//! Error taxonomy for synchronization runs

use thiserror::Error;

/// Stable error kind assigned by the classifier.
///
/// Every kind is either fatal (retrying cannot help) or transient
/// (expected to clear up on a later attempt).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    AuthenticationFailed,
    BotProtectionBlocked,
    ResourceNotFound,
    InvalidRequest,
    RateLimited,
    ServerError,
    NetworkTimeout,
    MalformedResponse,
    UnclassifiedApiError,
}

/// Shown to callers when a request is rejected by the host's bot filter.
pub const BOT_PROTECTION_HINT: &str = "the store's bot-protection filter rejected the request: \
     whitelist this machine's public IP in the firewall, or configure a different user_agent";

impl ErrorKind {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::NetworkTimeout | Self::UnclassifiedApiError
        )
    }

    pub fn is_fatal(self) -> bool {
        !self.is_transient()
    }

    /// Actionable guidance for kinds that have one.
    pub fn remediation_hint(self) -> Option<&'static str> {
        match self {
            Self::BotProtectionBlocked => Some(BOT_PROTECTION_HINT),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication failed",
            Self::BotProtectionBlocked => "blocked by bot protection",
            Self::ResourceNotFound => "resource not found",
            Self::InvalidRequest => "invalid request",
            Self::RateLimited => "rate limited",
            Self::ServerError => "server error",
            Self::NetworkTimeout => "network timeout",
            Self::MalformedResponse => "malformed response",
            Self::UnclassifiedApiError => "unclassified API error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failed attempt, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ErrorKind,
    /// HTTP status, absent for network-level failures
    pub status: Option<u16>,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(s) => write!(f, "{} (HTTP {s}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Error surfaced to callers of the core.
///
/// Always carries the resource/page context it originated from; the core
/// never turns one of these into an empty or partial success.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid configuration: {}", .problems.join("; "))]
    ConfigurationInvalid { problems: Vec<String> },

    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: ApiError,
    },

    #[error("{context}: retries exhausted after {attempts} attempts, last error: {last}")]
    RetriesExhausted {
        context: String,
        attempts: u32,
        last: ApiError,
    },

    #[error("{context}: cancelled")]
    Cancelled { context: String },
}

impl SyncError {
    pub fn config(problem: impl Into<String>) -> Self {
        Self::ConfigurationInvalid {
            problems: vec![problem.into()],
        }
    }

    /// Classifier kind behind this error, if it came from the API.
    pub fn api_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api { source, .. } => Some(source.kind),
            Self::RetriesExhausted { last, .. } => Some(last.kind),
            _ => None,
        }
    }

    /// Remediation hint, currently only for bot-protection blocks.
    pub fn remediation(&self) -> Option<&'static str> {
        self.api_kind().and_then(ErrorKind::remediation_hint)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
