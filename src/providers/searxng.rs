//! SearXNG Provider
//!
//! Client for a locally-hosted SearXNG metasearch instance. The provider
//! composes a lifecycle manager: the instance is auto-started through
//! docker compose on demand, probed for health before every query, and
//! optionally stopped on shutdown. Before the first start, bundled default
//! settings and the per-install secret are materialized into the user's
//! config directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::cancel::CancelHandle;
use crate::config::EngineConfig;
use crate::error::SearchError;
use crate::lifecycle::{LifecycleConfig, ServiceLifecycle, bootstrap};
use crate::provider::{ManagedProvider, SearchProvider, ValidationReport};
use crate::registry::plugins::PluginDeps;
use crate::types::{ProviderMetadata, SearchQuery, SearchResponse, SearchResultItem};

use super::{DEFAULT_REQUEST_TIMEOUT, execute_json, number_field, string_field};

pub struct SearxngProvider {
    id: String,
    display_name: String,
    endpoint: Url,
    default_limit: Option<u32>,
    lifecycle: Option<Arc<ServiceLifecycle>>,
    config_dir: PathBuf,
    data_dir: PathBuf,
    http: reqwest::Client,
    cancel: CancelHandle,
    timeout: Duration,
}

impl SearxngProvider {
    pub fn from_config(config: &EngineConfig, deps: &PluginDeps) -> Result<Self, SearchError> {
        let lifecycle = config.docker.as_ref().map(|docker| {
            Arc::new(ServiceLifecycle::new(
                config.id.clone(),
                LifecycleConfig::from(docker),
                deps.http.clone(),
            ))
        });

        Ok(Self {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            endpoint: config.endpoint.clone(),
            default_limit: config.default_limit,
            lifecycle,
            config_dir: deps.config_dir.clone(),
            data_dir: deps.data_dir.clone(),
            http: deps.http.clone(),
            cancel: deps.cancel.clone(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    fn search_url(&self) -> Result<Url, SearchError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                SearchError::Configuration(format!("{}: endpoint cannot be a base URL", self.id))
            })?;
            segments.pop_if_empty();
            segments.push("search");
        }
        Ok(url)
    }

    fn normalize(&self, value: &Value) -> Vec<SearchResultItem> {
        let results = value
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        results
            .iter()
            .filter_map(|entry| {
                let url = string_field(entry, &["url"])?;
                Some(SearchResultItem {
                    title: string_field(entry, &["title"]).unwrap_or_else(|| url.clone()),
                    url,
                    snippet: string_field(entry, &["content", "description", "snippet"])
                        .unwrap_or_default(),
                    score: number_field(entry, &["score", "rank"]),
                    source_engine: self.id.clone(),
                })
            })
            .collect()
    }

    /// Re-enter initialization once when the instance looks unhealthy.
    async fn ensure_backend_healthy(&self) -> Result<(), SearchError> {
        let Some(lifecycle) = &self.lifecycle else {
            return Ok(());
        };
        if lifecycle.healthcheck().await {
            return Ok(());
        }
        self.prepare_and_init(lifecycle).await?;
        if lifecycle.healthcheck().await {
            Ok(())
        } else {
            Err(SearchError::unavailable(
                &self.id,
                "instance is unhealthy after re-initialization",
            ))
        }
    }

    async fn prepare_and_init(&self, lifecycle: &ServiceLifecycle) -> Result<(), SearchError> {
        if lifecycle.config().auto_start {
            bootstrap::ensure_searxng_files(&self.config_dir, &self.data_dir).await?;
        }
        lifecycle.init().await
    }
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            docs_url: Some("https://docs.searxng.org".to_string()),
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        self.ensure_backend_healthy().await?;

        let mut params = vec![
            ("q".to_string(), query.query.clone()),
            ("format".to_string(), "json".to_string()),
        ];
        if let Some(categories) = &query.categories {
            if !categories.is_empty() {
                params.push(("categories".to_string(), categories.join(",")));
            }
        }

        let started = std::time::Instant::now();
        let request = self.http.get(self.search_url()?).query(&params);
        let value = execute_json(&self.id, request, self.timeout, &self.cancel).await?;

        let vendor_count = value
            .get("results")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        if vendor_count == 0 {
            return Err(SearchError::no_results(&self.id));
        }

        let mut items = self.normalize(&value);
        if let Some(limit) = query.limit.or(self.default_limit) {
            // The instance has no result-count parameter, so the limit is
            // applied to the normalized list instead.
            items.truncate(limit as usize);
        }

        Ok(SearchResponse {
            engine_id: self.id.clone(),
            items,
            raw: query.include_raw.then_some(value),
            took_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn as_managed(&self) -> Option<&dyn ManagedProvider> {
        self.lifecycle.as_ref().map(|_| self as &dyn ManagedProvider)
    }
}

#[async_trait]
impl ManagedProvider for SearxngProvider {
    async fn init(&self) -> Result<(), SearchError> {
        match &self.lifecycle {
            Some(lifecycle) => self.prepare_and_init(lifecycle).await,
            None => Ok(()),
        }
    }

    async fn healthcheck(&self) -> bool {
        match &self.lifecycle {
            Some(lifecycle) => lifecycle.healthcheck().await,
            None => true,
        }
    }

    async fn shutdown(&self) {
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.shutdown().await;
        }
    }

    async fn validate_config(&self) -> ValidationReport {
        match &self.lifecycle {
            Some(lifecycle) => lifecycle.validate_docker_config().await,
            None => ValidationReport::new(),
        }
    }
}
