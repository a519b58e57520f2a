//! Provider Contract
//!
//! Defines the uniform search interface implemented by every back end,
//! plus the narrower lifecycle extension implemented by providers whose
//! back end is a locally-managed service. Capability detection follows the
//! runtime-probe pattern: `as_managed()` returns the extended form when the
//! provider supports it and `None` otherwise, so callers never downcast.

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::{ProviderMetadata, SearchQuery, SearchResponse};

/// Uniform search interface over one configured back end.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Stable engine id this provider was configured with.
    fn id(&self) -> &str;

    /// Static metadata for display surfaces.
    fn metadata(&self) -> ProviderMetadata;

    /// Perform one search.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError>;

    /// Get the lifecycle extension if this provider manages a local
    /// service. Returns `None` by default.
    fn as_managed(&self) -> Option<&dyn ManagedProvider> {
        None
    }
}

/// Lifecycle extension for providers backed by a locally-hosted service.
#[async_trait]
pub trait ManagedProvider: Send + Sync {
    /// Bring the backing service up. Idempotent; concurrent calls share a
    /// single in-flight initialization.
    async fn init(&self) -> Result<(), SearchError>;

    /// Fast liveness probe. Never fails; an unreachable service is `false`.
    async fn healthcheck(&self) -> bool;

    /// Stop the backing service if this provider owns it. Idempotent and
    /// infallible; internal errors are logged and swallowed.
    async fn shutdown(&self);

    /// Static configuration checks (tool availability, file existence,
    /// well-formed endpoints).
    async fn validate_config(&self) -> ValidationReport;

    fn is_lifecycle_managed(&self) -> bool {
        true
    }
}

/// Outcome of a static configuration check.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_validity_tracks_errors_only() {
        let mut report = ValidationReport::new();
        assert!(report.is_valid());

        report.warning("container name looks odd");
        assert!(report.is_valid());

        report.error("compose file not found");
        assert!(!report.is_valid());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.warnings.len(), 1);
    }
}
