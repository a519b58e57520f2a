//! Shared fixtures for the integration tests: a programmable stub
//! provider plus builders for engine configs and strategy contexts.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use omnisearch::cancel::CancelHandle;
use omnisearch::config::EngineConfig;
use omnisearch::credits::{CreditManager, CreditStore, MemoryStore};
use omnisearch::error::SearchError;
use omnisearch::provider::SearchProvider;
use omnisearch::registry::ProviderRegistry;
use omnisearch::retry::RetryPolicy;
use omnisearch::strategy::StrategyContext;
use omnisearch::types::{ProviderMetadata, SearchQuery, SearchResponse, SearchResultItem};

/// What a stub engine does when searched.
#[derive(Clone)]
pub enum StubBehavior {
    Succeed(Vec<SearchResultItem>),
    Fail(SearchError),
    /// Fail `failures` times, then succeed with the given items.
    FailThenSucceed {
        failures: u32,
        error: SearchError,
        items: Vec<SearchResultItem>,
    },
}

pub struct StubProvider {
    id: String,
    behavior: StubBehavior,
    calls: AtomicU32,
}

impl StubProvider {
    pub fn new(id: &str, behavior: StubBehavior) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            behavior,
            calls: AtomicU32::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StubProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            display_name: self.id.clone(),
            docs_url: None,
        }
    }

    async fn search(&self, _query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            StubBehavior::Succeed(items) => Ok(SearchResponse {
                engine_id: self.id.clone(),
                items: items.clone(),
                raw: None,
                took_ms: 1,
            }),
            StubBehavior::Fail(error) => Err(error.clone()),
            StubBehavior::FailThenSucceed {
                failures,
                error,
                items,
            } => {
                if call < *failures {
                    Err(error.clone())
                } else {
                    Ok(SearchResponse {
                        engine_id: self.id.clone(),
                        items: items.clone(),
                        raw: None,
                        took_ms: 1,
                    })
                }
            }
        }
    }
}

pub fn item(engine: &str, title: &str, score: Option<f64>) -> SearchResultItem {
    SearchResultItem {
        title: title.to_string(),
        url: format!("https://example.com/{}", title.replace(' ', "-")),
        snippet: format!("snippet for {title}"),
        score,
        source_engine: engine.to_string(),
    }
}

pub fn engine_config(id: &str, quota: u64, cost: u64) -> EngineConfig {
    EngineConfig {
        engine_type: "tavily".to_string(),
        id: id.to_string(),
        enabled: true,
        display_name: id.to_string(),
        monthly_quota: quota,
        credit_cost_per_search: cost,
        low_credit_threshold_percent: 20,
        api_key_env: None,
        endpoint: Url::parse("https://example.com/search").unwrap(),
        search_depth: None,
        default_limit: None,
        docker: None,
    }
}

/// A retry policy with sub-millisecond backoff so tests stay fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new()
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(2))
}

/// Build a ready-to-use strategy context from stub providers and engine
/// configs, with credit state held in memory.
pub async fn context(
    providers: Vec<Arc<StubProvider>>,
    configs: &[EngineConfig],
) -> StrategyContext {
    context_with_store(providers, configs, Arc::new(MemoryStore::new())).await
}

pub async fn context_with_store(
    providers: Vec<Arc<StubProvider>>,
    configs: &[EngineConfig],
    store: Arc<dyn CreditStore>,
) -> StrategyContext {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry
            .register(provider as Arc<dyn SearchProvider>)
            .expect("unique stub ids");
    }

    let credits = CreditManager::new(configs.iter(), store);
    credits.initialize().await;

    StrategyContext {
        registry: Arc::new(registry),
        credits: Arc::new(credits),
        retry: fast_retry(),
        cancel: CancelHandle::new(),
    }
}

/// Credit usage for one engine, read through snapshots.
pub async fn used(ctx: &StrategyContext, engine_id: &str) -> u64 {
    ctx.credits
        .list_snapshots()
        .await
        .into_iter()
        .find(|s| s.engine_id == engine_id)
        .map(|s| s.used)
        .unwrap_or(0)
}
