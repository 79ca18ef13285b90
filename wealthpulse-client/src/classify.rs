//! Error classification.
//!
//! Turns settled non-2xx responses into [`GatewayError`]s with a
//! human-readable message, and records the failures worth showing an operator
//! in the [`ActionLog`]. 401s are never recorded here: they are either
//! recovered by a refresh or reported by the refresh coordinator.

use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

use crate::action_log::ActionLog;
use crate::error::GatewayError;
use crate::transport::ApiResponse;

/// Message used when neither the body nor the transport says anything useful.
pub const FALLBACK_MESSAGE: &str = "An unexpected error occurred";

/// Pick the most useful message out of a backend error body.
///
/// The backend answers `{"detail": "..."}` for handled errors and
/// `{"detail": [{"msg": "...", ...}]}` for validation errors.
pub fn detail_message(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(detail) if !detail.trim().is_empty() => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .filter(|msg| !msg.trim().is_empty())
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

/// `detail`, else `fallback`, else [`FALLBACK_MESSAGE`].
pub fn extract_message(body: &Value, fallback: Option<&str>) -> String {
    detail_message(body)
        .or_else(|| {
            fallback
                .filter(|msg| !msg.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
}

/// Build the error for a settled non-2xx response.
pub fn status_error(method: &Method, url: &str, response: &ApiResponse) -> GatewayError {
    if response.status == StatusCode::UNAUTHORIZED {
        return GatewayError::Unauthorized {
            method: method.clone(),
            url: url.to_string(),
        };
    }

    let body: Value = response.json().unwrap_or(Value::Null);
    let fallback = format!("Request failed with status code {}", response.status.as_u16());
    GatewayError::Status {
        status: response.status,
        method: method.clone(),
        url: url.to_string(),
        message: extract_message(&body, Some(&fallback)),
        body,
    }
}

/// Build the error for a request that never got a response.
pub fn transport_error(method: &Method, url: &str, message: &str) -> GatewayError {
    GatewayError::Transport {
        method: method.clone(),
        url: url.to_string(),
        message: extract_message(&Value::Null, Some(message)),
    }
}

/// Record `error` in the action log if it is one an operator should see.
///
/// Returns whether an entry was written.
pub fn record(log: &ActionLog, error: &GatewayError) -> bool {
    let (message, method, url, status) = match error {
        GatewayError::Status {
            status,
            method,
            url,
            message,
            ..
        } => {
            if *status == StatusCode::UNAUTHORIZED {
                return false;
            }
            (message, method, url, Some(status.as_u16()))
        }
        GatewayError::Transport {
            method,
            url,
            message,
        } => (message, method, url, None),
        _ => return false,
    };

    tracing::debug!(%method, %url, ?status, "Recording API error: {}", message);
    let mut details = json!({
        "url": url,
        "method": method.as_str(),
    });
    if let Some(status) = status {
        details["status"] = json!(status);
    }
    log.error(message.clone(), Some(details));
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse::new(StatusCode::from_u16(status).unwrap(), body)
    }

    #[test]
    fn test_string_detail_wins() {
        let body = json!({ "detail": "Asset not found" });
        assert_eq!(extract_message(&body, Some("ignored")), "Asset not found");
    }

    #[test]
    fn test_validation_details_are_joined() {
        let body = json!({
            "detail": [
                { "loc": ["body", "amount"], "msg": "field required" },
                { "loc": ["body", "date"], "msg": "invalid date" }
            ]
        });
        assert_eq!(
            extract_message(&body, None),
            "field required; invalid date"
        );
    }

    #[test]
    fn test_falls_back_to_transport_then_constant() {
        assert_eq!(
            extract_message(&Value::Null, Some("connection refused")),
            "connection refused"
        );
        assert_eq!(extract_message(&json!({ "detail": "" }), None), FALLBACK_MESSAGE);
        assert_eq!(extract_message(&json!({ "detail": 5 }), Some(" ")), FALLBACK_MESSAGE);
    }

    #[test]
    fn test_status_error_uses_detail() {
        let err = status_error(
            &Method::GET,
            "http://api/assets/9",
            &response(404, r#"{"detail":"Asset not found"}"#),
        );
        match err {
            GatewayError::Status {
                status, message, ..
            } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "Asset not found");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_status_error_without_json_body() {
        let err = status_error(&Method::POST, "http://api/x", &response(502, "<html>bad gateway</html>"));
        match err {
            GatewayError::Status { message, body, .. } => {
                assert_eq!(message, "Request failed with status code 502");
                assert_eq!(body, Value::Null);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unauthorized_maps_to_its_own_variant() {
        let err = status_error(&Method::GET, "http://api/x", &response(401, "{}"));
        assert!(matches!(err, GatewayError::Unauthorized { .. }));
    }

    #[test]
    fn test_record_logs_status_and_transport_errors() {
        let log = ActionLog::new(10);

        let server = status_error(
            &Method::DELETE,
            "http://api/assets/9",
            &response(500, r#"{"detail":"boom"}"#),
        );
        assert!(record(&log, &server));

        let offline = transport_error(&Method::GET, "http://api/assets", "connection refused");
        assert!(record(&log, &offline));

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "connection refused");
        assert!(entries[0].details.as_ref().unwrap().get("status").is_none());
        assert_eq!(entries[1].message, "boom");
        let details = entries[1].details.as_ref().unwrap();
        assert_eq!(details["url"], "http://api/assets/9");
        assert_eq!(details["method"], "DELETE");
        assert_eq!(details["status"], 500);
    }

    #[test]
    fn test_record_skips_unauthorized_and_local_errors() {
        let log = ActionLog::new(10);

        let unauthorized = status_error(&Method::GET, "http://api/x", &response(401, "{}"));
        assert!(!record(&log, &unauthorized));
        assert!(!record(&log, &GatewayError::from(crate::error::RefreshFailure::new("expired"))));
        assert!(!record(&log, &GatewayError::InvalidRequest("bad".to_string())));

        assert!(log.is_empty());
    }
}
