//! # Omnisearch - A Unified Web Search Interface
//!
//! Omnisearch dispatches one query across several heterogeneous search
//! back ends (cloud APIs and a locally-hosted metasearch instance) and
//! returns normalized, deduplicated results together with per-engine
//! outcome records and credit snapshots.
//!
//! ## Features
//!
//! - **One contract, many engines**: every back end implements
//!   [`provider::SearchProvider`]; locally-managed services additionally
//!   expose the [`provider::ManagedProvider`] lifecycle extension.
//! - **Two strategies**: fan-out over every engine (sequentially or
//!   concurrently) or stop at the first success.
//! - **Credit accounting**: per-engine monthly quotas with durable state
//!   and an advisory low-credit warning threshold.
//! - **Pluggable construction**: engine types map to provider factories
//!   through a plugin registry; four built-ins are pre-registered.
//! - **Managed lifecycle**: the local searxng instance is auto-started
//!   through docker compose, health-probed, and optionally auto-stopped.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use omnisearch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = omnisearch::config::load(None)?;
//!     let plugins = PluginRegistry::with_builtins();
//!     let orchestrator = SearchOrchestrator::bootstrap(config, &plugins).await?;
//!
//!     let report = orchestrator
//!         .run(
//!             SearchQuery::new("rust async runtimes").with_limit(10),
//!             SearchOptions::default(),
//!         )
//!         .await?;
//!
//!     for item in &report.items {
//!         println!("[{}] {} - {}", item.source_engine, item.title, item.url);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]

pub mod cancel;
pub mod cli;
pub mod config;
pub mod credits;
pub mod error;
pub mod lifecycle;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod strategy;
pub mod types;

pub use error::{FailureReason, SearchError};
pub use orchestrator::SearchOrchestrator;

/// Commonly used types, importable in one line.
pub mod prelude {
    pub use crate::cancel::CancelHandle;
    pub use crate::config::{AppConfig, EngineConfig};
    pub use crate::credits::{CreditManager, CreditStore, JsonFileStore, MemoryStore};
    pub use crate::error::{FailureReason, SearchError};
    pub use crate::orchestrator::SearchOrchestrator;
    pub use crate::provider::{ManagedProvider, SearchProvider, ValidationReport};
    pub use crate::registry::ProviderRegistry;
    pub use crate::registry::plugins::{PluginDefinition, PluginRegistry};
    pub use crate::retry::{RetryExecutor, RetryPolicy};
    pub use crate::strategy::{SearchStrategy, StrategyContext, StrategyOutput};
    pub use crate::types::{
        CreditSnapshot, EngineAttempt, SearchOptions, SearchQuery, SearchReport, SearchResponse,
        SearchResultItem, StrategyKind,
    };
}
