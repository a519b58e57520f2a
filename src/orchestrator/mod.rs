//! Search Orchestrator
//!
//! Top-level entry point: resolves the effective engine order, picks a
//! strategy, post-sorts fan-out results by score, and attaches credit
//! snapshots to the composite report. `bootstrap` wires configuration,
//! plugin registry, provider registry and credit manager together.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cancel::CancelHandle;
use crate::config::AppConfig;
use crate::credits::{CreditManager, CreditStore, JsonFileStore};
use crate::error::SearchError;
use crate::registry::ProviderRegistry;
use crate::registry::plugins::{PluginDeps, PluginRegistry};
use crate::retry::RetryPolicy;
use crate::strategy::{StrategyContext, strategy_for};
use crate::types::{SearchOptions, SearchQuery, SearchReport, StrategyKind};

pub struct SearchOrchestrator {
    config: AppConfig,
    registry: Arc<ProviderRegistry>,
    credits: Arc<CreditManager>,
    retry: RetryPolicy,
    cancel: CancelHandle,
}

impl SearchOrchestrator {
    /// Wire up an orchestrator from a validated configuration and a plugin
    /// registry, persisting credit state at the default XDG path.
    pub async fn bootstrap(
        config: AppConfig,
        plugins: &PluginRegistry,
    ) -> Result<Self, SearchError> {
        Self::bootstrap_with_store(config, plugins, Arc::new(JsonFileStore::at_default_path()))
            .await
    }

    /// Like [`Self::bootstrap`] with an explicit credit store, so tests
    /// and embedders can substitute their own persistence.
    pub async fn bootstrap_with_store(
        config: AppConfig,
        plugins: &PluginRegistry,
        store: Arc<dyn CreditStore>,
    ) -> Result<Self, SearchError> {
        let cancel = CancelHandle::new();
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| SearchError::Internal(format!("cannot build HTTP client: {e}")))?;
        let deps = PluginDeps::from_environment(http, cancel.clone());

        let mut registry = ProviderRegistry::new();
        for engine in config.enabled_engines() {
            match plugins.create_provider(engine, &deps) {
                Ok(provider) => {
                    if let Err(error) = registry.register(provider) {
                        warn!(engine = engine.id.as_str(), "skipping engine: {error}");
                    }
                }
                Err(error) => {
                    // Later runs will record `no_provider` for this engine.
                    warn!(
                        engine = engine.id.as_str(),
                        "failed to construct provider: {error}"
                    );
                }
            }
        }
        info!(providers = registry.len(), "provider registry ready");

        let credits = CreditManager::new(config.enabled_engines(), store);
        credits.initialize().await;

        let retry = config.retry.to_policy();
        Ok(Self {
            config,
            registry: Arc::new(registry),
            credits: Arc::new(credits),
            retry,
            cancel,
        })
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn credits(&self) -> &Arc<CreditManager> {
        &self.credits
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle that aborts in-flight searches when cancelled.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Dispatch one query and return the composite report.
    pub async fn run(
        &self,
        query: SearchQuery,
        options: SearchOptions,
    ) -> Result<SearchReport, SearchError> {
        let order = if options.engine_order_override.is_empty() {
            self.config.default_engine_order.clone()
        } else {
            options.engine_order_override.clone()
        };
        if order.is_empty() {
            return Err(SearchError::Configuration(
                "no engines in the effective order; configure defaultEngineOrder or pass --engines"
                    .to_string(),
            ));
        }

        info!(
            query = query.query.as_str(),
            strategy = %options.strategy,
            engines = order.len(),
            "dispatching search"
        );

        let strategy = strategy_for(options.strategy, options.parallel);
        let ctx = StrategyContext {
            registry: self.registry.clone(),
            credits: self.credits.clone(),
            retry: self.retry.clone(),
            cancel: self.cancel.clone(),
        };
        let mut output = strategy.execute(&ctx, &query, &order).await;

        if options.strategy == StrategyKind::All {
            // Stable sort keeps insertion order among equal scores.
            output.results.sort_by(|a, b| {
                b.effective_score()
                    .partial_cmp(&a.effective_score())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let credits = self.credits.list_snapshots().await;
        Ok(SearchReport {
            query: query.query.clone(),
            items: output.results,
            engines_tried: output.attempts,
            credits: Some(credits),
            raw_responses: (!output.raw_responses.is_empty()).then_some(output.raw_responses),
        })
    }

    /// Probe every registered provider. Providers without a lifecycle are
    /// reported healthy.
    pub async fn healthcheck_all(&self) -> Vec<(String, bool)> {
        let mut results = Vec::new();
        for provider in self.registry.list() {
            let healthy = match provider.as_managed() {
                Some(managed) => managed.healthcheck().await,
                None => true,
            };
            results.push((provider.id().to_string(), healthy));
        }
        results
    }

    /// Cancel in-flight work and shut down every managed provider.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        for provider in self.registry.list() {
            if let Some(managed) = provider.as_managed() {
                managed.shutdown().await;
            }
        }
    }
}
