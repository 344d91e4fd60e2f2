//! Pagination and retry behaviour against an in-memory store

mod common;

use std::time::Duration;

use common::{query_u32, response, ScriptedStore};
use storesync_core::{
    CancelToken, ErrorKind, FixedDelay, PageFetcher, RetryPolicy, SyncError, TransportError,
};

const P: u32 = 10;

fn retry() -> RetryPolicy {
    RetryPolicy::new(3, FixedDelay(Duration::ZERO))
}

fn fetch(store: &ScriptedStore) -> Result<storesync_core::FetchResult, SyncError> {
    PageFetcher::new(store, retry())
        .page_size(P)
        .fetch_all("products", &[])
}

fn assert_complete(result: &storesync_core::FetchResult, k: usize) {
    assert_eq!(result.len(), k);
    let ids: Vec<i64> = result.entities.iter().map(|e| e.id).collect();
    let expected: Vec<i64> = (1..=k as i64).collect();
    assert_eq!(ids, expected, "entities out of order or duplicated");
}

#[test]
fn termination_with_total_headers() {
    let p = P as usize;
    for k in [0, 1, p - 1, p, p + 1, 3 * p] {
        let store = ScriptedStore::new(k).with_headers();
        let result = fetch(&store).unwrap();
        assert_complete(&result, k);

        // Headers never end the loop: exact multiples still probe one more page.
        let expected_requests = k / p + 1;
        assert_eq!(store.calls(), expected_requests, "K={k}");
        assert_eq!(result.pages as usize, expected_requests, "K={k}");
        assert_eq!(result.reported_total, Some(k as u64));
    }
}

#[test]
fn stale_total_headers_do_not_truncate() {
    let store = ScriptedStore::new(15).with_fixed_headers(10, 1);
    let result = fetch(&store).unwrap();
    assert_complete(&result, 15);
    assert_eq!(store.pages_requested(), vec![1, 2]);
    assert_eq!(result.reported_total, Some(10));
}

#[test]
fn understated_totals_on_exact_multiple_keep_paging() {
    let store = ScriptedStore::new(20).with_fixed_headers(10, 1);
    let result = fetch(&store).unwrap();
    assert_complete(&result, 20);
    assert_eq!(store.pages_requested(), vec![1, 2, 3]);
}

#[test]
fn termination_without_headers() {
    let p = P as usize;
    for k in [0, 1, p - 1, p, p + 1, 3 * p] {
        let store = ScriptedStore::new(k);
        let result = fetch(&store).unwrap();
        assert_complete(&result, k);

        // Exact multiples need one trailing empty page to prove the end.
        let expected_requests = if k % p == 0 { k / p + 1 } else { k.div_ceil(p) };
        assert_eq!(store.calls(), expected_requests, "K={k}");
        assert_eq!(result.reported_total, None);
    }
}

#[test]
fn pages_requested_in_order() {
    let store = ScriptedStore::new(35).with_headers();
    fetch(&store).unwrap();
    assert_eq!(store.pages_requested(), vec![1, 2, 3, 4]);
    for req in store.requests() {
        assert_eq!(query_u32(&req, "per_page"), Some(P));
    }
}

#[test]
fn two_hundred_fifty_items_in_three_requests() {
    let store = ScriptedStore::new(250);
    let result = PageFetcher::new(&store, retry())
        .page_size(100)
        .fetch_all("products", &[])
        .unwrap();

    assert_eq!(result.len(), 250);
    assert_eq!(store.calls(), 3);
    assert_eq!(result.pages, 3);
    assert!(result.expected_export_rows() >= 250);
}

#[test]
fn oversized_page_size_is_clamped() {
    let store = ScriptedStore::new(5);
    let fetcher = PageFetcher::new(&store, retry()).page_size(250);
    assert_eq!(fetcher.current_page_size(), 100);
    fetcher.fetch_all("products", &[]).unwrap();
    assert_eq!(query_u32(&store.requests()[0], "per_page"), Some(100));
}

#[test]
fn filters_are_forwarded_but_cannot_override_paging() {
    let store = ScriptedStore::new(3);
    let filters = vec![
        ("status".to_string(), "any".to_string()),
        ("page".to_string(), "7".to_string()),
    ];
    PageFetcher::new(&store, retry())
        .page_size(P)
        .fetch_all("products", &filters)
        .unwrap();

    let req = &store.requests()[0];
    assert!(req.query.contains(&("status".to_string(), "any".to_string())));
    assert_eq!(req.query.iter().filter(|(k, _)| k == "page").count(), 1);
    assert_eq!(query_u32(req, "page"), Some(1));
}

#[test]
fn persistent_transient_error_exhausts_retries() {
    let store = ScriptedStore::new(30).with_hook(|_, _| Some(Ok(response(503, "busy"))));
    let err = fetch(&store).unwrap_err();

    assert_eq!(store.calls(), 4);
    match err {
        SyncError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(attempts, 4);
            assert_eq!(last.kind, ErrorKind::ServerError);
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
}

#[test]
fn zero_retries_means_one_attempt() {
    let store = ScriptedStore::new(30).with_hook(|_, _| Some(Ok(response(500, ""))));
    let err = PageFetcher::new(&store, RetryPolicy::none())
        .page_size(P)
        .fetch_all("products", &[])
        .unwrap_err();
    assert_eq!(store.calls(), 1);
    assert!(matches!(err, SyncError::RetriesExhausted { attempts: 1, .. }));
}

#[test]
fn auth_failure_short_circuits() {
    let store = ScriptedStore::new(30).with_hook(|_, _| {
        Some(Ok(response(
            401,
            r#"{"code":"woocommerce_rest_cannot_view","message":"Sorry"}"#,
        )))
    });
    let err = fetch(&store).unwrap_err();

    assert_eq!(store.calls(), 1);
    assert!(matches!(err, SyncError::Api { .. }));
    assert_eq!(err.api_kind(), Some(ErrorKind::AuthenticationFailed));
    assert!(err.remediation().is_none());
}

#[test]
fn bot_protection_block_is_fatal_with_hint() {
    let store = ScriptedStore::new(30).with_hook(|_, _| {
        Some(Ok(response(
            403,
            "<html><title>Access denied by Imunify360 bot-protection</title></html>",
        )))
    });
    let err = fetch(&store).unwrap_err();

    assert_eq!(store.calls(), 1);
    assert_eq!(err.api_kind(), Some(ErrorKind::BotProtectionBlocked));
    assert!(err.remediation().is_some());
}

#[test]
fn generic_forbidden_is_retried() {
    let store =
        ScriptedStore::new(30).with_hook(|_, _| Some(Ok(response(403, "Forbidden"))));
    let err = fetch(&store).unwrap_err();

    assert_eq!(store.calls(), 4);
    assert_eq!(err.api_kind(), Some(ErrorKind::UnclassifiedApiError));
    assert!(err.remediation().is_none());
}

#[test]
fn transient_failures_recover() {
    let store = ScriptedStore::new(25).with_hook(|_, call| match call {
        0 => Some(Err(TransportError::Timeout("operation timed out".into()))),
        2 => Some(Ok(response(502, "Bad Gateway"))),
        3 => Some(Ok(response(429, "slow down"))),
        _ => None,
    });
    let result = fetch(&store).unwrap();

    assert_complete(&result, 25);
    assert_eq!(store.pages_requested(), vec![1, 1, 2, 2, 2, 3]);
    assert_eq!(result.pages, 3);
}

#[test]
fn failure_on_page_three_discards_everything() {
    let store = ScriptedStore::new(50).with_hook(|req, _| {
        (query_u32(req, "page") == Some(3)).then(|| Ok(response(500, "fatal error")))
    });
    let err = fetch(&store).unwrap_err();

    assert_eq!(store.pages_requested(), vec![1, 2, 3, 3, 3, 3]);
    match &err {
        SyncError::RetriesExhausted { context, .. } => assert!(context.contains("page 3")),
        other => panic!("expected RetriesExhausted, got {other}"),
    }
}

#[test]
fn malformed_body_is_not_retried() {
    let store = ScriptedStore::new(30)
        .with_hook(|_, _| Some(Ok(response(200, "<html>maintenance</html>"))));
    let err = fetch(&store).unwrap_err();

    assert_eq!(store.calls(), 1);
    assert_eq!(err.api_kind(), Some(ErrorKind::MalformedResponse));
}

#[test]
fn cancelled_before_start_sends_nothing() {
    let store = ScriptedStore::new(30);
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = PageFetcher::new(&store, retry())
        .page_size(P)
        .cancel_token(cancel)
        .fetch_all("products", &[])
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(store.calls(), 0);
}

#[test]
fn cancelled_between_pages() {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let store = ScriptedStore::new(50).with_hook(move |req, _| {
        if query_u32(req, "page") == Some(2) {
            trigger.cancel();
        }
        None
    });
    let err = PageFetcher::new(&store, retry())
        .page_size(P)
        .cancel_token(cancel)
        .fetch_all("products", &[])
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(store.pages_requested(), vec![1, 2]);
}
