//! Storesync Core - resilient client for paginated store REST APIs
//!
//! This crate provides the transport, retry controller, error classifier
//! and pagination fetcher that turn a store's product/order/customer
//! collections into complete, all-or-nothing [`FetchResult`]s.

pub mod cancel;
pub mod classify;
pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod model;
pub mod pagination;
pub mod progress;
pub mod retry;
pub mod transport;

// Re-exports for convenience
pub use cancel::CancelToken;
pub use classify::{classify, BOT_PROTECTION_MARKERS};
pub use config::{ClientConfig, DEFAULT_USER_AGENT, MAX_PAGE_SIZE};
pub use connector::Connector;
pub use error::{ApiError, ErrorKind, SyncError};
pub use logging::{init_logging, IndicatifLogger};
pub use model::{AttributeBag, AttributeValue, Category, Entity, FetchResult, Scalar, Status};
pub use pagination::PageFetcher;
pub use progress::{fmt_num, ProgressContext, SharedProgress};
pub use retry::{Backoff, ExponentialBackoff, FixedDelay, RetryPolicy};
pub use transport::{
    HttpTransport, Method, PageHints, RawResponse, Request, Transport, TransportError,
    SHARED_RUNTIME,
};
