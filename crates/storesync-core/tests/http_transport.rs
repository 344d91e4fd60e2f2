//! reqwest transport against a local mock server

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use storesync_core::{
    ClientConfig, Connector, ErrorKind, HttpTransport, Request, Transport, TransportError,
    DEFAULT_USER_AGENT,
};
use tokio::runtime::Runtime;
use wiremock::matchers::{basic_auth, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        retry_delay_ms: 0,
        ..ClientConfig::new(server.uri(), "ck_test", "cs_test")
    }
}

fn transport(cfg: ClientConfig) -> HttpTransport {
    HttpTransport::new(Arc::new(cfg.normalized())).unwrap()
}

// ── Request shape ───────────────────────────────────────────────

#[test]
fn sends_browser_identity_and_query_auth() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/wp-json/wc/v3/products"))
            .and(header("accept", "application/json"))
            .and(query_param("consumer_key", "ck_test"))
            .and(query_param("consumer_secret", "cs_test"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-WP-Total", "2")
                    .insert_header("X-WP-TotalPages", "1")
                    .set_body_json(json!([{"id": 1}, {"id": 2}])),
            )
            .expect(1)
            .mount(&server),
    );

    let t = transport(config(&server));
    let resp = t
        .send(&Request::get("products").query("page", 1))
        .unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.hints.total, Some(2));
    assert_eq!(resp.hints.total_pages, Some(1));
    rt.block_on(server.verify());

    let received = rt.block_on(server.received_requests()).unwrap();
    let agent = received[0].headers.get("user-agent").unwrap();
    assert_eq!(agent.to_str().unwrap(), DEFAULT_USER_AGENT);
}

#[test]
fn basic_auth_when_query_auth_disabled() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("GET"))
            .and(basic_auth("ck_test", "cs_test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server),
    );

    let cfg = ClientConfig {
        query_string_auth: false,
        ..config(&server)
    };
    let resp = transport(cfg).send(&Request::get("orders")).unwrap();
    assert_eq!(resp.status, 200);

    let received = rt.block_on(server.received_requests()).unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].url.query().is_none());
}

#[test]
fn custom_user_agent_overrides_default() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(header("user-agent", "storesync-test/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server),
    );

    let cfg = ClientConfig {
        user_agent: Some("storesync-test/1.0".to_string()),
        ..config(&server)
    };
    let resp = transport(cfg).send(&Request::get("products")).unwrap();
    assert_eq!(resp.status, 200);
    rt.block_on(server.verify());
}

// ── Failures ────────────────────────────────────────────────────

#[test]
fn slow_server_maps_to_timeout() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server),
    );

    let cfg = ClientConfig {
        timeout_secs: 1,
        ..config(&server)
    };
    let err = transport(cfg).send(&Request::get("products")).unwrap_err();
    assert!(matches!(err, TransportError::Timeout(_)), "got {err}");
    assert!(!err.to_string().contains("cs_test"));
}

#[test]
fn refused_connection_is_a_transport_error() {
    let cfg = ClientConfig {
        timeout_secs: 2,
        ..ClientConfig::new("http://127.0.0.1:9", "ck_test", "cs_test")
    };
    let err = transport(cfg).send(&Request::get("products")).unwrap_err();
    assert!(!err.to_string().contains("cs_test"));
}

#[test]
fn bot_protection_page_through_connector() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/wp-json/wc/v3/products"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                "<html><body>Access denied by Imunify360 bot-protection.</body></html>",
            ))
            .expect(1)
            .mount(&server),
    );

    let connector = Connector::new(config(&server)).unwrap();
    let err = connector.fetch_all_entities("products", &[]).unwrap_err();

    assert_eq!(err.api_kind(), Some(ErrorKind::BotProtectionBlocked));
    assert!(err.remediation().is_some());
    rt.block_on(server.verify());
}

// ── End to end ──────────────────────────────────────────────────

#[test]
fn connector_fetches_all_pages() {
    let rt = runtime();
    let server = rt.block_on(MockServer::start());
    let items = |range: std::ops::Range<i64>| {
        range
            .map(|i| json!({"id": i, "name": format!("P{i}"), "categories": []}))
            .collect::<Vec<_>>()
    };
    for (page, body) in [("1", items(1..3)), ("2", items(3..4))] {
        rt.block_on(
            Mock::given(method("GET"))
                .and(path("/wp-json/wc/v3/products"))
                .and(query_param("page", page))
                .and(query_param("per_page", "2"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("X-WP-Total", "3")
                        .insert_header("X-WP-TotalPages", "2")
                        .set_body_json(json!(body)),
                )
                .expect(1)
                .mount(&server),
        );
    }

    let cfg = ClientConfig {
        page_size: 2,
        ..config(&server)
    };
    let result = Connector::new(cfg)
        .unwrap()
        .fetch_all_entities("products", &[])
        .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.pages, 2);
    assert_eq!(result.reported_total, Some(3));
    rt.block_on(server.verify());
}
