//! Page-by-page retrieval of a full collection
//!
//! Pages are requested strictly in order: whether page N exists is only
//! known once page N-1 has been inspected. The loop stops on an empty page
//! or a short page, nothing else. Server totals (`X-WP-Total`,
//! `X-WP-TotalPages`) may be stale, so they only drive the progress bar and
//! the end-of-run consistency warning.
//!
//! A page that fails (fatally, or after exhausting retries) aborts the whole
//! fetch. Callers never see a truncated collection.

use std::time::Duration;

use indicatif::ProgressBar;
use serde_json::Value;

use crate::cancel::CancelToken;
use crate::classify::{classify, response_error, transport_error};
use crate::config::{clamp_page_size, MAX_PAGE_SIZE};
use crate::error::{ApiError, ErrorKind, SyncError};
use crate::model::{Entity, FetchResult};
use crate::progress::{fmt_num, upgrade_to_pages};
use crate::retry::RetryPolicy;
use crate::transport::{PageHints, RawResponse, Request, Transport};

/// Hard stop for servers that keep returning full pages
const MAX_PAGES: u32 = 100_000;

/// Query keys owned by the fetcher; caller filters cannot override them.
const RESERVED_KEYS: [&str; 2] = ["page", "per_page"];

/// One decoded page.
#[derive(Debug)]
pub struct Page {
    pub number: u32,
    pub entities: Vec<Entity>,
    pub hints: PageHints,
}

/// Drives the retry controller across successive pages.
pub struct PageFetcher<'a, T: Transport + ?Sized> {
    transport: &'a T,
    retry: RetryPolicy,
    cancel: CancelToken,
    page_size: u32,
    inter_page_delay: Duration,
    progress: ProgressBar,
}

impl<'a, T: Transport + ?Sized> PageFetcher<'a, T> {
    pub fn new(transport: &'a T, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            cancel: CancelToken::new(),
            page_size: MAX_PAGE_SIZE,
            inter_page_delay: Duration::ZERO,
            progress: ProgressBar::hidden(),
        }
    }

    /// Requested page size, clamped to `1..=100`.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = clamp_page_size(page_size);
        self
    }

    /// Pause between successive page requests (not before the first).
    pub fn inter_page_delay(mut self, delay: Duration) -> Self {
        self.inter_page_delay = delay;
        self
    }

    pub fn cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn progress(mut self, pb: ProgressBar) -> Self {
        self.progress = pb;
        self
    }

    pub fn current_page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch every page of `resource`.
    ///
    /// `filters` are extra query parameters (e.g. `status=any`).
    pub fn fetch_all(
        &self,
        resource: &str,
        filters: &[(String, String)],
    ) -> Result<FetchResult, SyncError> {
        let pb = &self.progress;
        pb.set_message(format!("{resource}: starting..."));
        log::info!(
            "Fetching all {resource} (per_page={})",
            self.page_size
        );

        let mut entities: Vec<Entity> = Vec::new();
        let mut hints = PageHints::default();
        let mut page = 1u32;
        let mut last_count;

        loop {
            if self.cancel.is_cancelled() {
                log::warn!(
                    "{resource}: cancelled before page {page}, discarding {} fetched items",
                    entities.len()
                );
                return Err(SyncError::Cancelled {
                    context: format!("{resource} page {page}"),
                });
            }
            if page > MAX_PAGES {
                return Err(SyncError::Api {
                    context: format!("{resource} page {page}"),
                    source: ApiError::new(
                        ErrorKind::MalformedResponse,
                        None,
                        format!("server returned full pages beyond page {MAX_PAGES}"),
                    ),
                });
            }
            if page > 1 && !self.inter_page_delay.is_zero() {
                std::thread::sleep(self.inter_page_delay);
            }

            let fetched = self.fetch_page(resource, filters, page)?;
            last_count = fetched.entities.len();
            if page == 1 {
                if let Some(total_pages) = fetched.hints.total_pages {
                    upgrade_to_pages(pb, u64::from(total_pages));
                }
            }
            merge_hints(&mut hints, fetched.hints);
            entities.extend(fetched.entities);

            pb.set_position(u64::from(page));
            pb.set_message(format!("{resource}: {} items", fmt_num(entities.len())));
            log::debug!(
                "{resource} page {page}: {last_count} items (total {})",
                entities.len()
            );

            if last_count == 0 {
                log::debug!("{resource}: empty page {page}, done");
                break;
            }
            if last_count < self.page_size as usize {
                log::debug!("{resource}: short page {page}, done");
                break;
            }
            page += 1;
        }

        check_consistency(resource, hints, page, last_count, entities.len());
        log::info!(
            "Fetched {} {resource} in {page} page request(s)",
            fmt_num(entities.len())
        );

        Ok(FetchResult {
            resource: resource.to_string(),
            entities,
            pages: page,
            reported_total: hints.total,
        })
    }

    /// Fetch and decode a single page, with retries.
    pub fn fetch_page(
        &self,
        resource: &str,
        filters: &[(String, String)],
        page: u32,
    ) -> Result<Page, SyncError> {
        let request = page_request(resource, filters, page, self.page_size);
        let label = format!("{resource} page {page}");
        self.retry.execute(
            &label,
            request.method.is_idempotent(),
            &self.progress,
            |attempt| {
                if attempt > 1 {
                    log::debug!("{label}: attempt {attempt}");
                }
                let response = self
                    .transport
                    .send(&request)
                    .map_err(|e| transport_error(&e))?;
                let entities = decode_list(&response)?;
                Ok(Page {
                    number: page,
                    entities,
                    hints: response.hints,
                })
            },
        )
    }
}

/// Build the list request for one page.
pub fn page_request(
    resource: &str,
    filters: &[(String, String)],
    page: u32,
    page_size: u32,
) -> Request {
    let mut request = Request::get(resource)
        .query("page", page)
        .query("per_page", page_size);
    for (key, value) in filters {
        if RESERVED_KEYS.contains(&key.as_str()) {
            log::warn!("ignoring filter '{key}': pagination parameters are managed internally");
            continue;
        }
        request = request.query(key.clone(), value);
    }
    request
}

/// Classify a list response and decode its items.
pub fn decode_list(response: &RawResponse) -> Result<Vec<Entity>, ApiError> {
    decode_body(response).and_then(|value| match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                Entity::from_json(item).map_err(|e| {
                    ApiError::new(
                        ErrorKind::MalformedResponse,
                        Some(response.status),
                        format!("item {i}: {e}"),
                    )
                })
            })
            .collect(),
        _ => Err(ApiError::new(
            ErrorKind::MalformedResponse,
            Some(response.status),
            "expected a JSON array of items",
        )),
    })
}

/// Classify any response and parse its JSON body.
pub fn decode_body(response: &RawResponse) -> Result<Value, ApiError> {
    if let Some(kind) = classify(response.status, &response.body) {
        return Err(response_error(kind, response.status, &response.body));
    }
    if response.status == 204 {
        return Ok(Value::Null);
    }
    serde_json::from_str(&response.body).map_err(|e| {
        ApiError::new(
            ErrorKind::MalformedResponse,
            Some(response.status),
            e.to_string(),
        )
    })
}

/// Keep the latest advertised value of each hint.
fn merge_hints(acc: &mut PageHints, latest: PageHints) {
    if latest.total.is_some() {
        acc.total = latest.total;
    }
    if latest.total_pages.is_some() {
        acc.total_pages = latest.total_pages;
    }
}

/// Log (never fail) when server totals disagree with the fetched collection.
fn check_consistency(resource: &str, hints: PageHints, pages: u32, last_count: usize, received: usize) {
    if let Some(total) = hints.total {
        if total != received as u64 {
            log::warn!("{resource}: server reported {total} items but {received} were fetched");
        }
    }
    if let Some(total_pages) = hints.total_pages {
        let trailing_empty = last_count == 0 && pages == total_pages + 1;
        if pages != total_pages && !trailing_empty {
            log::warn!(
                "{resource}: server reported {total_pages} pages but {pages} were requested"
            );
        }
    }
}
