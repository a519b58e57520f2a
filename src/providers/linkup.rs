//! Linkup Provider
//!
//! HTTP client for the Linkup search API. Linkup is usually a cloud
//! back end, but a self-hosted deployment can carry a docker sub-record,
//! in which case the same lifecycle manager as searxng is composed in.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use url::Url;

use crate::cancel::CancelHandle;
use crate::config::EngineConfig;
use crate::error::SearchError;
use crate::lifecycle::{LifecycleConfig, ServiceLifecycle};
use crate::provider::{ManagedProvider, SearchProvider, ValidationReport};
use crate::registry::plugins::PluginDeps;
use crate::types::{ProviderMetadata, SearchQuery, SearchResponse, SearchResultItem};

use super::{DEFAULT_REQUEST_TIMEOUT, execute_json, number_field, string_field};

const DEFAULT_API_KEY_ENV: &str = "LINKUP_API_KEY";

pub struct LinkupProvider {
    id: String,
    display_name: String,
    endpoint: Url,
    api_key: Option<SecretString>,
    api_key_env: String,
    lifecycle: Option<Arc<ServiceLifecycle>>,
    http: reqwest::Client,
    cancel: CancelHandle,
    timeout: Duration,
}

impl LinkupProvider {
    pub fn from_config(config: &EngineConfig, deps: &PluginDeps) -> Result<Self, SearchError> {
        let api_key_env = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
        let api_key = std::env::var(&api_key_env).ok().map(SecretString::from);

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
            api_key,
            api_key_env,
            lifecycle,
            http: deps.http.clone(),
            cancel: deps.cancel.clone(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
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
                    title: string_field(entry, &["name", "title"]).unwrap_or_else(|| url.clone()),
                    url,
                    snippet: string_field(entry, &["content", "description", "snippet"])
                        .unwrap_or_default(),
                    score: number_field(entry, &["score", "rank"]),
                    source_engine: self.id.clone(),
                })
            })
            .collect()
    }

    async fn ensure_backend_healthy(&self) -> Result<(), SearchError> {
        let Some(lifecycle) = &self.lifecycle else {
            return Ok(());
        };
        if lifecycle.healthcheck().await {
            return Ok(());
        }
        lifecycle.init().await?;
        if lifecycle.healthcheck().await {
            Ok(())
        } else {
            Err(SearchError::unavailable(
                &self.id,
                "service is unhealthy after re-initialization",
            ))
        }
    }
}

#[async_trait]
impl SearchProvider for LinkupProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            docs_url: Some("https://docs.linkup.so".to_string()),
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            SearchError::Configuration(format!(
                "{}: missing API key environment variable {}",
                self.id, self.api_key_env
            ))
        })?;

        self.ensure_backend_healthy().await?;

        let mut body = json!({
            "q": query.query,
            "depth": "standard",
            "outputType": "searchResults",
        });
        if let Some(limit) = query.limit {
            body["maxResults"] = json!(limit);
        }

        let started = std::time::Instant::now();
        let request = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(api_key.expose_secret())
            .json(&body);
        let value = execute_json(&self.id, request, self.timeout, &self.cancel).await?;

        let vendor_count = value
            .get("results")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        if vendor_count == 0 {
            return Err(SearchError::no_results(&self.id));
        }

        Ok(SearchResponse {
            engine_id: self.id.clone(),
            items: self.normalize(&value),
            raw: query.include_raw.then_some(value),
            took_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn as_managed(&self) -> Option<&dyn ManagedProvider> {
        self.lifecycle.as_ref().map(|_| self as &dyn ManagedProvider)
    }
}

#[async_trait]
impl ManagedProvider for LinkupProvider {
    async fn init(&self) -> Result<(), SearchError> {
        match &self.lifecycle {
            Some(lifecycle) => lifecycle.init().await,
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

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(endpoint: &str) -> LinkupProvider {
        LinkupProvider {
            id: "linkup".to_string(),
            display_name: "Linkup".to_string(),
            endpoint: Url::parse(endpoint).unwrap(),
            api_key: Some(SecretString::from("test-key")),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            lifecycle: None,
            http: reqwest::Client::new(),
            cancel: CancelHandle::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[test]
    fn normalization_prefers_name_over_title() {
        let value = serde_json::json!({
            "results": [
                {"type": "text", "name": "Rust Book", "url": "https://doc.rust-lang.org/book", "content": "learn rust"},
            ]
        });

        let items = provider("https://api.linkup.so/v1/search").normalize(&value);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Rust Book");
        assert_eq!(items[0].snippet, "learn rust");
    }

    #[test]
    fn cloud_deployment_is_not_lifecycle_managed() {
        let provider = provider("https://api.linkup.so/v1/search");
        assert!(provider.as_managed().is_none());
    }
}
