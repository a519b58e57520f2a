//! Configuration Module
//!
//! Engine and application configuration, file resolution and the built-in
//! default configuration synthesized from the environment.
//!
//! Resolution order: explicit path, then `omnisearch.config.{toml,json}`
//! in the current directory, then `config.{toml,json}` under
//! `$XDG_CONFIG_HOME/omnisearch` (fallback `~/.config/omnisearch`). Within
//! a directory the TOML variant takes precedence over JSON. When nothing
//! is found, a default configuration is synthesized that enables the local
//! searxng engine plus any cloud engine whose API-key environment variable
//! is set, ordered by generosity of their free tier.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::error::SearchError;
use crate::retry::RetryPolicy;
use crate::types::EngineId;

/// Directory and file-name stem used for every persisted artifact.
pub const APP_NAME: &str = "omnisearch";

/// Tavily search depth flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

/// Docker lifecycle sub-record for locally-hosted engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerConfig {
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub auto_stop: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_endpoint: Option<String>,
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,
}

fn default_init_timeout_ms() -> u64 {
    60_000
}

/// One configured engine.
///
/// The `type` discriminator is an open string rather than a closed enum so
/// plugin-registered engine types deserialize with the same shape as the
/// built-ins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(rename = "type")]
    pub engine_type: String,
    pub id: EngineId,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub display_name: String,
    pub monthly_quota: u64,
    #[serde(default)]
    pub credit_cost_per_search: u64,
    #[serde(default = "default_low_credit_threshold")]
    pub low_credit_threshold_percent: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub endpoint: Url,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_depth: Option<SearchDepth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerConfig>,
}

fn default_true() -> bool {
    true
}

fn default_low_credit_threshold() -> u8 {
    20
}

/// Retry tuning, deserialized alongside the engine list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_initial_delay(std::time::Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(std::time::Duration::from_millis(self.max_delay_ms))
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub engines: Vec<EngineConfig>,
    pub default_engine_order: Vec<EngineId>,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl AppConfig {
    /// Enabled engines, in declaration order.
    pub fn enabled_engines(&self) -> impl Iterator<Item = &EngineConfig> {
        self.engines.iter().filter(|e| e.enabled)
    }

    pub fn engine(&self, id: &str) -> Option<&EngineConfig> {
        self.engines.iter().find(|e| e.id == id)
    }

    /// Structural checks applied after loading: non-empty unique ids and
    /// positive quotas.
    pub fn validate(&self) -> Result<(), SearchError> {
        let mut seen = std::collections::HashSet::new();
        for engine in &self.engines {
            if engine.id.is_empty() {
                return Err(SearchError::Configuration(
                    "engine with an empty id".to_string(),
                ));
            }
            if !seen.insert(engine.id.as_str()) {
                return Err(SearchError::Configuration(format!(
                    "duplicate engine id '{}'",
                    engine.id
                )));
            }
            if engine.monthly_quota == 0 {
                return Err(SearchError::Configuration(format!(
                    "engine '{}' has a zero monthly quota",
                    engine.id
                )));
            }
        }
        Ok(())
    }
}

/// Base configuration directory (`$XDG_CONFIG_HOME` or `~/.config`).
pub fn config_base_dir() -> PathBuf {
    if let Ok(base) = std::env::var("XDG_CONFIG_HOME") {
        if !base.is_empty() {
            return PathBuf::from(base);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
}

/// Base state directory (`$XDG_STATE_HOME` or `~/.local/state`).
pub fn state_base_dir() -> PathBuf {
    if let Ok(base) = std::env::var("XDG_STATE_HOME") {
        if !base.is_empty() {
            return PathBuf::from(base);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("state")
}

/// Base data directory (`$XDG_DATA_HOME` or `~/.local/share`).
pub fn data_base_dir() -> PathBuf {
    if let Ok(base) = std::env::var("XDG_DATA_HOME") {
        if !base.is_empty() {
            return PathBuf::from(base);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
}

/// `$XDG_CONFIG_HOME/omnisearch`.
pub fn app_config_dir() -> PathBuf {
    config_base_dir().join(APP_NAME)
}

/// `$XDG_STATE_HOME/omnisearch`.
pub fn app_state_dir() -> PathBuf {
    state_base_dir().join(APP_NAME)
}

/// `$XDG_DATA_HOME/omnisearch`.
pub fn app_data_dir() -> PathBuf {
    data_base_dir().join(APP_NAME)
}

/// Load the application configuration, following the resolution order.
pub fn load(explicit: Option<&Path>) -> Result<AppConfig, SearchError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(SearchError::Configuration(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let config = parse_file(path)?;
        config.validate()?;
        info!(path = %path.display(), "loaded configuration");
        return Ok(config);
    }

    let cwd_candidates = [
        PathBuf::from(format!("{APP_NAME}.config.toml")),
        PathBuf::from(format!("{APP_NAME}.config.json")),
    ];
    let xdg_dir = app_config_dir();
    let xdg_candidates = [xdg_dir.join("config.toml"), xdg_dir.join("config.json")];

    for candidate in cwd_candidates.iter().chain(xdg_candidates.iter()) {
        if candidate.exists() {
            let config = parse_file(candidate)?;
            config.validate()?;
            info!(path = %candidate.display(), "loaded configuration");
            return Ok(config);
        }
    }

    debug!("no configuration file found, synthesizing defaults from the environment");
    let config = default_config();
    config.validate()?;
    Ok(config)
}

fn parse_file(path: &Path) -> Result<AppConfig, SearchError> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        SearchError::Configuration(format!("cannot read {}: {e}", path.display()))
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&text).map_err(|e| {
            SearchError::Configuration(format!("invalid TOML in {}: {e}", path.display()))
        }),
        Some("json") => serde_json::from_str(&text).map_err(|e| {
            SearchError::Configuration(format!("invalid JSON in {}: {e}", path.display()))
        }),
        _ => Err(SearchError::Configuration(format!(
            "unsupported config extension: {}",
            path.display()
        ))),
    }
}

/// Built-in default configuration.
///
/// Always enables the local searxng engine; cloud engines join the order
/// only when their API-key environment variable is present, sorted by how
/// generous their free tier is.
pub fn default_config() -> AppConfig {
    let searxng_dir = app_config_dir().join("searxng");
    let mut engines = vec![EngineConfig {
        engine_type: "searxng".to_string(),
        id: "searxng".to_string(),
        enabled: true,
        display_name: "SearXNG (local)".to_string(),
        monthly_quota: 1_000_000,
        credit_cost_per_search: 0,
        low_credit_threshold_percent: 20,
        api_key_env: None,
        endpoint: Url::parse("http://localhost:8080").expect("static URL"),
        search_depth: None,
        default_limit: Some(20),
        docker: Some(DockerConfig {
            auto_start: true,
            auto_stop: false,
            compose_file: Some(searxng_dir.join("docker-compose.yml")),
            container_name: Some("omnisearch-searxng".to_string()),
            health_endpoint: Some("http://localhost:8080/healthz".to_string()),
            init_timeout_ms: 60_000,
            project_root: None,
        }),
    }];
    let mut order = vec!["searxng".to_string()];

    if std::env::var("BRAVE_API_KEY").is_ok() {
        engines.push(EngineConfig {
            engine_type: "brave".to_string(),
            id: "brave".to_string(),
            enabled: true,
            display_name: "Brave Search".to_string(),
            monthly_quota: 2000,
            credit_cost_per_search: 1,
            low_credit_threshold_percent: 20,
            api_key_env: Some("BRAVE_API_KEY".to_string()),
            endpoint: Url::parse("https://api.search.brave.com/res/v1/web/search")
                .expect("static URL"),
            search_depth: None,
            default_limit: Some(10),
            docker: None,
        });
        order.push("brave".to_string());
    }

    if std::env::var("TAVILY_API_KEY").is_ok() {
        engines.push(EngineConfig {
            engine_type: "tavily".to_string(),
            id: "tavily".to_string(),
            enabled: true,
            display_name: "Tavily".to_string(),
            monthly_quota: 1000,
            credit_cost_per_search: 1,
            low_credit_threshold_percent: 20,
            api_key_env: Some("TAVILY_API_KEY".to_string()),
            endpoint: Url::parse("https://api.tavily.com/search").expect("static URL"),
            search_depth: Some(SearchDepth::Basic),
            default_limit: None,
            docker: None,
        });
        order.push("tavily".to_string());
    }

    if std::env::var("LINKUP_API_KEY").is_ok() {
        engines.push(EngineConfig {
            engine_type: "linkup".to_string(),
            id: "linkup".to_string(),
            enabled: true,
            display_name: "Linkup".to_string(),
            monthly_quota: 500,
            credit_cost_per_search: 1,
            low_credit_threshold_percent: 20,
            api_key_env: Some("LINKUP_API_KEY".to_string()),
            endpoint: Url::parse("https://api.linkup.so/v1/search").expect("static URL"),
            search_depth: None,
            default_limit: None,
            docker: None,
        });
        order.push("linkup".to_string());
    }

    AppConfig {
        engines,
        default_engine_order: order,
        retry: RetryConfig::default(),
    }
}
