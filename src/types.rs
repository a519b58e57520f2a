//! Core Data Types
//!
//! Queries, normalized results, per-engine attempt records, credit
//! snapshots and the composite search report. Wire-visible types serialize
//! camelCase to match the persisted state and the `--json` output schema.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FailureReason;

/// Stable identity of one configured engine.
pub type EngineId = String;

/// Static, human-facing information about a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    pub id: EngineId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
}

/// A single search request, shared by every provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub query: String,
    /// Forwarded to every provider unchanged; the merged result list is
    /// truncated to this length after the merge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default)]
    pub include_raw: bool,
    /// Engine categories (searxng), e.g. `general`, `news`, `images`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<String>>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_include_raw(mut self, include_raw: bool) -> Self {
        self.include_raw = include_raw;
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }
}

/// One normalized result item, tagged with the engine that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultItem {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Relevance score when the vendor reports one; absent scores compare
    /// as 0 in sort contexts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub source_engine: EngineId,
}

impl SearchResultItem {
    /// Score with the absent-is-zero convention applied.
    pub fn effective_score(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }
}

/// One provider's reply to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub engine_id: EngineId,
    pub items: Vec<SearchResultItem>,
    /// The vendor's unmodified response body, kept only when the query
    /// asked for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
    pub took_ms: u64,
}

/// Per-engine outcome record emitted by every strategy invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineAttempt {
    pub engine_id: EngineId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
}

impl EngineAttempt {
    pub fn ok(engine_id: impl Into<EngineId>) -> Self {
        Self {
            engine_id: engine_id.into(),
            success: true,
            reason: None,
        }
    }

    pub fn failed(engine_id: impl Into<EngineId>, reason: FailureReason) -> Self {
        Self {
            engine_id: engine_id.into(),
            success: false,
            reason: Some(reason),
        }
    }
}

/// Persisted usage row for one engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditRecord {
    pub used: u64,
    pub last_reset: DateTime<Utc>,
}

/// The persisted credit document: engine id to usage row.
pub type CreditState = BTreeMap<EngineId, CreditRecord>;

/// Derived (never persisted) view over one engine's credit situation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSnapshot {
    pub engine_id: EngineId,
    pub quota: u64,
    pub used: u64,
    pub remaining: u64,
    pub is_exhausted: bool,
    pub last_reset: DateTime<Utc>,
}

/// Strategy selection for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Query every engine in the effective order.
    #[default]
    All,
    /// Stop at the first engine that succeeds.
    FirstSuccess,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::FirstSuccess => "first-success",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "first-success" => Ok(Self::FirstSuccess),
            other => Err(format!(
                "invalid strategy '{other}' (expected 'all' or 'first-success')"
            )),
        }
    }
}

/// Per-run options consumed by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub strategy: StrategyKind,
    /// When non-empty, replaces the configured default engine order.
    pub engine_order_override: Vec<EngineId>,
    /// Run the all-strategy's engines concurrently instead of in order.
    pub parallel: bool,
}

impl SearchOptions {
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_engine_order(mut self, order: Vec<EngineId>) -> Self {
        self.engine_order_override = order;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// The composite record returned by `SearchOrchestrator::run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub query: String,
    pub items: Vec<SearchResultItem>,
    pub engines_tried: Vec<EngineAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits: Option<Vec<CreditSnapshot>>,
    /// Raw vendor responses keyed by engine, present only with `includeRaw`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_responses: Option<BTreeMap<EngineId, serde_json::Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_serializes_camel_case_and_skips_reason_on_success() {
        let ok = serde_json::to_value(EngineAttempt::ok("tavily")).unwrap();
        assert_eq!(ok, serde_json::json!({"engineId": "tavily", "success": true}));

        let failed =
            serde_json::to_value(EngineAttempt::failed("brave", FailureReason::RateLimit)).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"engineId": "brave", "success": false, "reason": "rate_limit"})
        );
    }

    #[test]
    fn credit_record_round_trips_last_reset() {
        let json = r#"{"used": 42, "lastReset": "2024-01-15T00:00:00Z"}"#;
        let record: CreditRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.used, 42);
        let back = serde_json::to_value(&record).unwrap();
        assert!(back.get("lastReset").is_some());
    }

    #[test]
    fn strategy_kind_parses_both_variants() {
        assert_eq!("all".parse::<StrategyKind>().unwrap(), StrategyKind::All);
        assert_eq!(
            "first-success".parse::<StrategyKind>().unwrap(),
            StrategyKind::FirstSuccess
        );
        assert!("fastest".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn absent_score_compares_as_zero() {
        let item = SearchResultItem {
            title: "t".into(),
            url: "https://example.com".into(),
            snippet: String::new(),
            score: None,
            source_engine: "searxng".into(),
        };
        assert_eq!(item.effective_score(), 0.0);
    }
}
