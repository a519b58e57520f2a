//! Brave Search Provider
//!
//! HTTP client for the Brave Web Search API. Brave authenticates with an
//! `X-Subscription-Token` header and nests web hits under `web.results`;
//! it reports no relevance score, so items sort with the absent-is-zero
//! convention.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use url::Url;

use crate::cancel::CancelHandle;
use crate::config::EngineConfig;
use crate::error::SearchError;
use crate::provider::SearchProvider;
use crate::registry::plugins::PluginDeps;
use crate::types::{ProviderMetadata, SearchQuery, SearchResponse, SearchResultItem};

use super::{DEFAULT_REQUEST_TIMEOUT, execute_json, number_field, string_field};

const DEFAULT_API_KEY_ENV: &str = "BRAVE_API_KEY";

pub struct BraveProvider {
    id: String,
    display_name: String,
    endpoint: Url,
    api_key: Option<SecretString>,
    api_key_env: String,
    default_limit: Option<u32>,
    http: reqwest::Client,
    cancel: CancelHandle,
    timeout: Duration,
}

impl BraveProvider {
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
            default_limit: config.default_limit,
            http: deps.http.clone(),
            cancel: deps.cancel.clone(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    fn normalize(&self, value: &Value) -> Vec<SearchResultItem> {
        let results = value
            .get("web")
            .and_then(|web| web.get("results"))
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

    fn vendor_count(value: &Value) -> usize {
        value
            .get("web")
            .and_then(|web| web.get("results"))
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            docs_url: Some("https://brave.com/search/api/".to_string()),
        }
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SearchError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            SearchError::Configuration(format!(
                "{}: missing API key environment variable {}",
                self.id, self.api_key_env
            ))
        })?;

        let mut params = vec![("q".to_string(), query.query.clone())];
        if let Some(count) = query.limit.or(self.default_limit) {
            params.push(("count".to_string(), count.to_string()));
        }

        let started = std::time::Instant::now();
        let request = self
            .http
            .get(self.endpoint.clone())
            .header("X-Subscription-Token", api_key.expose_secret())
            .header("Accept", "application/json")
            .query(&params);
        let value = execute_json(&self.id, request, self.timeout, &self.cancel).await?;

        if Self::vendor_count(&value) == 0 {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(endpoint: &str) -> BraveProvider {
        BraveProvider {
            id: "brave".to_string(),
            display_name: "Brave Search".to_string(),
            endpoint: Url::parse(endpoint).unwrap(),
            api_key: Some(SecretString::from("test-key")),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            default_limit: Some(10),
            http: reqwest::Client::new(),
            cancel: CancelHandle::new(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[test]
    fn normalization_walks_the_web_results_nesting() {
        let value = serde_json::json!({
            "web": {
                "results": [
                    {"title": "Rust", "url": "https://rust-lang.org", "description": "a language"},
                    {"title": "Crates", "url": "https://crates.io", "description": "packages"},
                ]
            }
        });

        let items = provider("https://api.search.brave.com/res/v1/web/search").normalize(&value);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].snippet, "a language");
        assert_eq!(items[0].score, None);
    }

    #[test]
    fn empty_web_results_counts_as_zero() {
        let value = serde_json::json!({"web": {"results": []}});
        assert_eq!(BraveProvider::vendor_count(&value), 0);
        let value = serde_json::json!({"query": {"original": "x"}});
        assert_eq!(BraveProvider::vendor_count(&value), 0);
    }
}
