//! In-memory store used by the integration tests. No network.

#![allow(dead_code)]

use std::sync::Mutex;

use serde_json::{json, Value};
use storesync_core::{PageHints, RawResponse, Request, Transport, TransportError};

type Hook = Box<dyn Fn(&Request, usize) -> Option<Result<RawResponse, TransportError>>>;

/// Serves `items` generated products, paginated by the request's
/// `page`/`per_page`. A hook can replace any response; it receives the
/// request and the 0-based call index.
pub struct ScriptedStore {
    items: usize,
    headers: bool,
    fixed_hints: Option<PageHints>,
    hook: Option<Hook>,
    log: Mutex<Vec<Request>>,
}

impl ScriptedStore {
    pub fn new(items: usize) -> Self {
        Self {
            items,
            headers: false,
            fixed_hints: None,
            hook: None,
            log: Mutex::new(Vec::new()),
        }
    }

    /// Advertise `X-WP-Total` / `X-WP-TotalPages`.
    pub fn with_headers(mut self) -> Self {
        self.headers = true;
        self
    }

    /// Advertise the same totals on every page, whatever the real count.
    pub fn with_fixed_headers(mut self, total: u64, total_pages: u32) -> Self {
        self.fixed_hints = Some(PageHints {
            total: Some(total),
            total_pages: Some(total_pages),
        });
        self
    }

    pub fn with_hook(
        mut self,
        hook: impl Fn(&Request, usize) -> Option<Result<RawResponse, TransportError>> + 'static,
    ) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.log.lock().unwrap().clone()
    }

    /// `page` query values of every list request, in order.
    pub fn pages_requested(&self) -> Vec<u32> {
        self.requests()
            .iter()
            .filter_map(|r| query_u32(r, "page"))
            .collect()
    }

    fn serve_page(&self, request: &Request) -> RawResponse {
        let page = query_u32(request, "page").unwrap_or(1) as usize;
        let per_page = query_u32(request, "per_page").unwrap_or(10) as usize;
        let start = ((page - 1) * per_page).min(self.items);
        let end = (start + per_page).min(self.items);
        let body: Vec<Value> = (start..end).map(product).collect();

        let hints = if let Some(fixed) = self.fixed_hints {
            fixed
        } else if self.headers {
            PageHints {
                total: Some(self.items as u64),
                total_pages: Some(self.items.div_ceil(per_page) as u32),
            }
        } else {
            PageHints::default()
        };
        RawResponse {
            status: 200,
            hints,
            body: Value::Array(body).to_string(),
        }
    }
}

impl Transport for ScriptedStore {
    fn send(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let index = {
            let mut log = self.log.lock().unwrap();
            log.push(request.clone());
            log.len() - 1
        };
        if let Some(hook) = &self.hook {
            if let Some(response) = hook(request, index) {
                return response;
            }
        }
        Ok(self.serve_page(request))
    }
}

/// Product `i` (0-based): id `i + 1`, one category, every third item in two.
pub fn product(i: usize) -> Value {
    let mut categories = vec![json!({"id": i % 4 + 1, "name": format!("Cat {}", i % 4 + 1)})];
    if i % 3 == 0 {
        categories.push(json!({"id": 10, "name": "Featured"}));
    }
    json!({
        "id": i + 1,
        "name": format!("Item {}", i + 1),
        "status": "publish",
        "price": format!("{}.00", i + 1),
        "categories": categories,
    })
}

pub fn response(status: u16, body: &str) -> RawResponse {
    RawResponse {
        status,
        hints: PageHints::default(),
        body: body.to_string(),
    }
}

pub fn query_u32(request: &Request, key: &str) -> Option<u32> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.parse().ok())
}
