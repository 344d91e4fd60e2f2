//! Response classification: (status, body) -> error kind
//!
//! Pure functions, so the heuristics (notably the bot-protection body
//! sniffing) can change without touching retry or pagination code.
//! First matching row wins:
//!
//! | condition                                   | kind                   |
//! |---------------------------------------------|------------------------|
//! | 401                                         | `AuthenticationFailed` |
//! | 403 + bot-protection marker in body         | `BotProtectionBlocked` |
//! | 404                                         | `ResourceNotFound`     |
//! | 400                                         | `InvalidRequest`       |
//! | 429                                         | `RateLimited`          |
//! | 500..=599                                   | `ServerError`          |
//! | timeout / connection failure                | `NetworkTimeout`       |
//! | 2xx with a body that is not JSON            | `MalformedResponse`    |
//! | any other non-2xx                           | `UnclassifiedApiError` |

use serde::de::IgnoredAny;

use crate::error::{ApiError, ErrorKind};
use crate::transport::TransportError;

/// Case-insensitive body markers identifying a bot-protection block page.
pub const BOT_PROTECTION_MARKERS: &[&str] = &["bot-protection", "imunify360"];

/// Longest body excerpt kept in error messages
const BODY_EXCERPT_LEN: usize = 200;

/// Classify an HTTP response.
///
/// Returns `None` when the response is usable (2xx with well-formed JSON,
/// or 204 with no body).
pub fn classify(status: u16, body: &str) -> Option<ErrorKind> {
    match status {
        401 => Some(ErrorKind::AuthenticationFailed),
        403 if has_bot_marker(body) => Some(ErrorKind::BotProtectionBlocked),
        404 => Some(ErrorKind::ResourceNotFound),
        400 => Some(ErrorKind::InvalidRequest),
        429 => Some(ErrorKind::RateLimited),
        500..=599 => Some(ErrorKind::ServerError),
        204 => None,
        200..=299 => {
            if serde_json::from_str::<IgnoredAny>(body).is_ok() {
                None
            } else {
                Some(ErrorKind::MalformedResponse)
            }
        }
        _ => Some(ErrorKind::UnclassifiedApiError),
    }
}

/// Network-level failures never reach the server; all of them are transient.
pub fn classify_transport(_err: &TransportError) -> ErrorKind {
    ErrorKind::NetworkTimeout
}

fn has_bot_marker(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    BOT_PROTECTION_MARKERS.iter().any(|m| lower.contains(m))
}

/// Build an [`ApiError`] for a rejected response, trimming the body excerpt.
pub fn response_error(kind: ErrorKind, status: u16, body: &str) -> ApiError {
    let trimmed = body.trim();
    let excerpt: String = trimmed.chars().take(BODY_EXCERPT_LEN).collect();
    let message = if excerpt.is_empty() {
        "empty response body".to_string()
    } else if excerpt.len() < trimmed.len() {
        format!("{excerpt}...")
    } else {
        excerpt
    };
    ApiError::new(kind, Some(status), message)
}

/// Build an [`ApiError`] for a request that never produced a response.
pub fn transport_error(err: &TransportError) -> ApiError {
    ApiError::new(classify_transport(err), None, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_table() {
        let cases: &[(u16, &str, Option<ErrorKind>)] = &[
            (401, "", Some(ErrorKind::AuthenticationFailed)),
            (401, "bot-protection", Some(ErrorKind::AuthenticationFailed)),
            (
                403,
                "<h1>Access denied by Imunify360 bot-protection</h1>",
                Some(ErrorKind::BotProtectionBlocked),
            ),
            (403, "IMUNIFY360", Some(ErrorKind::BotProtectionBlocked)),
            (403, "Bot-Protection active", Some(ErrorKind::BotProtectionBlocked)),
            (403, "forbidden", Some(ErrorKind::UnclassifiedApiError)),
            (404, "", Some(ErrorKind::ResourceNotFound)),
            (400, "{\"code\":\"rest_invalid_param\"}", Some(ErrorKind::InvalidRequest)),
            (429, "", Some(ErrorKind::RateLimited)),
            (500, "", Some(ErrorKind::ServerError)),
            (503, "maintenance", Some(ErrorKind::ServerError)),
            (599, "", Some(ErrorKind::ServerError)),
            (200, "[]", None),
            (200, "[{\"id\":1}]", None),
            (200, "{\"environment\":{}}", None),
            (201, "{\"id\":5}", None),
            (204, "", None),
            (200, "<html>not json</html>", Some(ErrorKind::MalformedResponse)),
            (200, "", Some(ErrorKind::MalformedResponse)),
            (200, "[{\"id\":1}", Some(ErrorKind::MalformedResponse)),
            (302, "", Some(ErrorKind::UnclassifiedApiError)),
            (409, "", Some(ErrorKind::UnclassifiedApiError)),
            (418, "", Some(ErrorKind::UnclassifiedApiError)),
        ];
        for (status, body, expected) in cases {
            assert_eq!(
                classify(*status, body),
                *expected,
                "status {status}, body {body:?}"
            );
        }
    }

    #[test]
    fn generic_403_is_distinct_from_bot_block() {
        assert_ne!(
            classify(403, "Forbidden"),
            classify(403, "blocked by bot-protection")
        );
    }

    #[test]
    fn transport_failures_are_timeouts() {
        let err = TransportError::Timeout("30s elapsed".into());
        assert_eq!(classify_transport(&err), ErrorKind::NetworkTimeout);
        let err = TransportError::Connect("connection reset".into());
        assert_eq!(classify_transport(&err), ErrorKind::NetworkTimeout);
        assert!(transport_error(&err).status.is_none());
    }

    #[test]
    fn response_error_truncates_body() {
        let body = "x".repeat(1000);
        let err = response_error(ErrorKind::ServerError, 500, &body);
        assert_eq!(err.status, Some(500));
        assert!(err.message.ends_with("..."));
        assert_eq!(err.message.len(), BODY_EXCERPT_LEN + 3);
    }

    #[test]
    fn response_error_empty_body() {
        let err = response_error(ErrorKind::ResourceNotFound, 404, "  ");
        assert_eq!(err.message, "empty response body");
    }
}
