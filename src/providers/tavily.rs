//! Tavily Provider
//!
//! HTTP client for the Tavily search API. Tavily reports a relevance
//! score per result, which flows straight into the normalized items.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use url::Url;

use crate::cancel::CancelHandle;
use crate::config::{EngineConfig, SearchDepth};
use crate::error::SearchError;
use crate::provider::SearchProvider;
use crate::registry::plugins::PluginDeps;
use crate::types::{ProviderMetadata, SearchQuery, SearchResponse, SearchResultItem};

use super::{DEFAULT_REQUEST_TIMEOUT, execute_json, number_field, string_field};

const DEFAULT_API_KEY_ENV: &str = "TAVILY_API_KEY";

pub struct TavilyProvider {
    id: String,
    display_name: String,
    endpoint: Url,
    api_key: Option<SecretString>,
    api_key_env: String,
    search_depth: SearchDepth,
    http: reqwest::Client,
    cancel: CancelHandle,
    timeout: Duration,
}

impl TavilyProvider {
    pub fn from_config(config: &EngineConfig, deps: &PluginDeps) -> Result<Self, SearchError> {
        let api_key_env = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string());
        let api_key = std::env::var(&api_key_env).ok().map(SecretString::from);

        Ok(Self {
            id: config.id.clone(),
            display_name: config.display_name.clone(),
            endpoint: config.endpoint.clone(),
            api_key,
            api_key_env,
            search_depth: config.search_depth.unwrap_or(SearchDepth::Basic),
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
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            docs_url: Some("https://docs.tavily.com".to_string()),
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            SearchError::Configuration(format!(
                "{}: missing API key environment variable {}",
                self.id, self.api_key_env
            ))
        })?;

        let depth = match self.search_depth {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        };
        let mut body = json!({
            "query": query.query,
            "search_depth": depth,
        });
        if let Some(limit) = query.limit {
            body["max_results"] = json!(limit);
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
}
