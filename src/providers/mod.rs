//! Provider Implementations
//!
//! One module per back end plus the shared HTTP request protocol: build a
//! request, enforce the per-request timeout, classify the outcome into the
//! failure taxonomy, and parse the body as JSON. Vendor-specific shapes
//! are normalized into `SearchResultItem` with deterministic field
//! preferences (title over url-as-fallback, content over description over
//! snippet, score over rank).

pub mod brave;
pub mod linkup;
pub mod searxng;
pub mod tavily;

pub use brave::BraveProvider;
pub use linkup::LinkupProvider;
pub use searxng::SearxngProvider;
pub use tavily::TavilyProvider;

use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::cancel::CancelHandle;
use crate::error::SearchError;

/// Default per-request timeout.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of characters of a response body quoted in errors.
const BODY_EXCERPT_LEN: usize = 200;

/// Send a request and classify the outcome.
///
/// - 429 -> `rate_limit`
/// - other non-2xx -> `api_error` with a body excerpt
/// - abort, timeout or transport failure -> `network_error`
/// - body that is not JSON -> `api_error` with an "invalid JSON" prefix
pub(crate) async fn execute_json(
    engine_id: &str,
    request: reqwest::RequestBuilder,
    timeout: Duration,
    cancel: &CancelHandle,
) -> Result<Value, SearchError> {
    let send = request.timeout(timeout).send();
    let response = tokio::select! {
        _ = cancel.cancelled() => {
            return Err(SearchError::network(engine_id, "request cancelled"));
        }
        result = send => result.map_err(|e| classify_transport_error(engine_id, &e))?,
    };

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SearchError::network(engine_id, format!("error reading body: {e}")))?;

    if status.as_u16() == 429 {
        return Err(SearchError::rate_limited(engine_id, excerpt(&body)));
    }
    if !status.is_success() {
        debug!(engine = engine_id, status = status.as_u16(), "non-success response");
        return Err(SearchError::api(
            engine_id,
            Some(status.as_u16()),
            excerpt(&body),
        ));
    }

    serde_json::from_str(&body)
        .map_err(|e| SearchError::api(engine_id, None, format!("invalid JSON: {e}")))
}

fn classify_transport_error(engine_id: &str, error: &reqwest::Error) -> SearchError {
    if error.is_timeout() {
        SearchError::network(engine_id, "request timed out")
    } else {
        SearchError::network(engine_id, error.to_string())
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT_LEN {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(BODY_EXCERPT_LEN).collect();
        format!("{head}...")
    }
}

/// First non-empty string among `keys` in a vendor result object.
pub(crate) fn string_field(object: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// First numeric value among `keys` in a vendor result object.
pub(crate) fn number_field(object: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| object.get(key).and_then(Value::as_f64))
}
