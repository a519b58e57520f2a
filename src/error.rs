//! Error Handling Module
//!
//! This module provides the error types shared across the library:
//! - `SearchError`, the error produced by providers and the orchestration layer
//! - `FailureReason`, the wire-visible outcome taxonomy used in attempt records
//!
//! # Example
//!
//! ```rust
//! use omnisearch::error::{FailureReason, SearchError};
//!
//! let error = SearchError::api("tavily", Some(503), "upstream unavailable");
//! assert_eq!(error.reason(), FailureReason::ApiError);
//! assert!(error.is_retryable());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome taxonomy shared by errors and per-engine attempt records.
///
/// `LowCredit` is advisory and never blocks execution; `OutOfCredit` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NetworkError,
    ApiError,
    RateLimit,
    NoResults,
    LowCredit,
    OutOfCredit,
    ConfigError,
    NoProvider,
    ProviderUnavailable,
    Unknown,
}

impl FailureReason {
    /// The snake_case tag used in attempt records and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::ApiError => "api_error",
            Self::RateLimit => "rate_limit",
            Self::NoResults => "no_results",
            Self::LowCredit => "low_credit",
            Self::OutOfCredit => "out_of_credit",
            Self::ConfigError => "config_error",
            Self::NoProvider => "no_provider",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by providers and the orchestration layer.
///
/// The enum is `Clone` so the retry engine can replay the last failure and
/// the lifecycle manager can hand one result to every coalesced `init()`
/// caller.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// Connection failures, timeouts and cancelled requests.
    #[error("[{engine_id}] network error: {message}")]
    Network { engine_id: String, message: String },

    /// Non-2xx responses (except 429) and malformed response bodies.
    #[error("[{engine_id}] API error: {message}")]
    Api {
        engine_id: String,
        status: Option<u16>,
        message: String,
    },

    /// HTTP 429 from the back end.
    #[error("[{engine_id}] rate limited: {message}")]
    RateLimited { engine_id: String, message: String },

    /// The back end answered with an empty result set.
    #[error("[{engine_id}] no results")]
    NoResults { engine_id: String },

    /// Invalid or missing configuration (unknown engine type, missing API
    /// key environment variable, empty engine order, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A managed back end is not reachable and could not be (re)started.
    #[error("[{engine_id}] provider unavailable: {message}")]
    ProviderUnavailable { engine_id: String, message: String },

    /// Everything that does not fit the taxonomy above.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SearchError {
    pub fn network(engine_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            engine_id: engine_id.into(),
            message: message.into(),
        }
    }

    pub fn api(
        engine_id: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Api {
            engine_id: engine_id.into(),
            status,
            message: message.into(),
        }
    }

    pub fn rate_limited(engine_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            engine_id: engine_id.into(),
            message: message.into(),
        }
    }

    pub fn no_results(engine_id: impl Into<String>) -> Self {
        Self::NoResults {
            engine_id: engine_id.into(),
        }
    }

    pub fn unavailable(engine_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            engine_id: engine_id.into(),
            message: message.into(),
        }
    }

    /// Map this error into the attempt-record taxonomy.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Network { .. } => FailureReason::NetworkError,
            Self::Api { .. } => FailureReason::ApiError,
            Self::RateLimited { .. } => FailureReason::RateLimit,
            Self::NoResults { .. } => FailureReason::NoResults,
            Self::Configuration(_) => FailureReason::ConfigError,
            Self::ProviderUnavailable { .. } => FailureReason::ProviderUnavailable,
            Self::Internal(_) => FailureReason::Unknown,
        }
    }

    /// The engine this error is attributed to, when known.
    pub fn engine_id(&self) -> Option<&str> {
        match self {
            Self::Network { engine_id, .. }
            | Self::Api { engine_id, .. }
            | Self::RateLimited { engine_id, .. }
            | Self::NoResults { engine_id }
            | Self::ProviderUnavailable { engine_id, .. } => Some(engine_id),
            Self::Configuration(_) | Self::Internal(_) => None,
        }
    }

    /// The HTTP status code, for API errors that carried one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Whether this error is retryable under the default retry set
    /// (`network_error`, `api_error`, `rate_limit`, `no_results`).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.reason(),
            FailureReason::NetworkError
                | FailureReason::ApiError
                | FailureReason::RateLimit
                | FailureReason::NoResults
        )
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

impl From<std::io::Error> for SearchError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("I/O error: {err}"))
    }
}
