//! End-to-end orchestrator tests: configuration through bootstrap,
//! strategy execution, score post-sort and the composite report, with
//! vendor back ends simulated by wiremock.

use std::sync::Arc;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use omnisearch::config::{AppConfig, EngineConfig, RetryConfig};
use omnisearch::credits::MemoryStore;
use omnisearch::error::FailureReason;
use omnisearch::orchestrator::SearchOrchestrator;
use omnisearch::registry::plugins::PluginRegistry;
use omnisearch::types::{SearchOptions, SearchQuery, StrategyKind};

/// A searxng-type engine needs no API key, which keeps these tests
/// hermetic: everything flows through the mock server.
fn local_engine(id: &str, endpoint: &str) -> EngineConfig {
    EngineConfig {
        engine_type: "searxng".to_string(),
        id: id.to_string(),
        enabled: true,
        display_name: id.to_string(),
        monthly_quota: 1000,
        credit_cost_per_search: 1,
        low_credit_threshold_percent: 20,
        api_key_env: None,
        endpoint: Url::parse(endpoint).unwrap(),
        search_depth: None,
        default_limit: None,
        docker: None,
    }
}

fn config_with(engines: Vec<EngineConfig>, order: &[&str]) -> AppConfig {
    AppConfig {
        engines,
        default_engine_order: order.iter().map(|s| s.to_string()).collect(),
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
        },
    }
}

async fn mock_engine_results(server: &MockServer, results: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": results})))
        .mount(server)
        .await;
}

async fn bootstrap(config: AppConfig) -> SearchOrchestrator {
    let plugins = PluginRegistry::with_builtins();
    SearchOrchestrator::bootstrap_with_store(config, &plugins, Arc::new(MemoryStore::new()))
        .await
        .unwrap()
}

#[tokio::test]
async fn fan_out_sorts_merged_items_by_descending_score() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;
    mock_engine_results(
        &alpha,
        json!([
            {"title": "mid", "url": "https://example.com/mid", "content": "x", "score": 0.5},
            {"title": "low", "url": "https://example.com/low", "content": "x", "score": 0.1},
        ]),
    )
    .await;
    mock_engine_results(
        &beta,
        json!([
            {"title": "high", "url": "https://example.com/high", "content": "x", "score": 0.9},
        ]),
    )
    .await;

    let config = config_with(
        vec![
            local_engine("alpha", &alpha.uri()),
            local_engine("beta", &beta.uri()),
        ],
        &["alpha", "beta"],
    );
    let orchestrator = bootstrap(config).await;

    let report = orchestrator
        .run(SearchQuery::new("rust"), SearchOptions::default())
        .await
        .unwrap();

    let titles: Vec<_> = report.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["high", "mid", "low"]);

    assert_eq!(report.engines_tried.len(), 2);
    assert!(report.engines_tried.iter().all(|a| a.success));
    let attempt_ids: Vec<_> = report
        .engines_tried
        .iter()
        .map(|a| a.engine_id.as_str())
        .collect();
    assert_eq!(attempt_ids, vec!["alpha", "beta"]);

    let credits = report.credits.expect("credit snapshots attached");
    assert!(credits.iter().all(|s| s.used == 1));
}

#[tokio::test]
async fn failed_engines_contribute_no_items() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(429).set_body_string("later"))
        .mount(&alpha)
        .await;
    mock_engine_results(
        &beta,
        json!([{"title": "only", "url": "https://example.com/only", "content": "x", "score": 1.0}]),
    )
    .await;

    let config = config_with(
        vec![
            local_engine("alpha", &alpha.uri()),
            local_engine("beta", &beta.uri()),
        ],
        &["alpha", "beta"],
    );
    let orchestrator = bootstrap(config).await;

    let report = orchestrator
        .run(SearchQuery::new("rust"), SearchOptions::default())
        .await
        .unwrap();

    assert!(report.items.iter().all(|i| i.source_engine == "beta"));
    assert_eq!(report.engines_tried[0].reason, Some(FailureReason::RateLimit));
    assert!(report.engines_tried[1].success);

    let credits = report.credits.unwrap();
    let alpha_used = credits.iter().find(|s| s.engine_id == "alpha").unwrap().used;
    assert_eq!(alpha_used, 0);
}

#[tokio::test]
async fn empty_effective_order_is_a_config_error() {
    let config = config_with(vec![], &[]);
    let orchestrator = bootstrap(config).await;

    let error = orchestrator
        .run(SearchQuery::new("rust"), SearchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(error.reason(), FailureReason::ConfigError);
}

#[tokio::test]
async fn unknown_engine_type_surfaces_as_no_provider() {
    let mut engine = local_engine("mystery", "http://localhost:9");
    engine.engine_type = "not-a-real-type".to_string();
    let config = config_with(vec![engine], &["mystery"]);
    let orchestrator = bootstrap(config).await;

    let report = orchestrator
        .run(SearchQuery::new("rust"), SearchOptions::default())
        .await
        .unwrap();

    assert!(report.items.is_empty());
    assert_eq!(report.engines_tried.len(), 1);
    assert_eq!(report.engines_tried[0].reason, Some(FailureReason::NoProvider));
}

#[tokio::test]
async fn engine_order_override_limits_the_run() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;
    mock_engine_results(
        &alpha,
        json!([{"title": "a", "url": "https://example.com/a", "content": "x"}]),
    )
    .await;
    mock_engine_results(
        &beta,
        json!([{"title": "b", "url": "https://example.com/b", "content": "x"}]),
    )
    .await;

    let config = config_with(
        vec![
            local_engine("alpha", &alpha.uri()),
            local_engine("beta", &beta.uri()),
        ],
        &["alpha", "beta"],
    );
    let orchestrator = bootstrap(config).await;

    let report = orchestrator
        .run(
            SearchQuery::new("rust"),
            SearchOptions::default().with_engine_order(vec!["beta".to_string()]),
        )
        .await
        .unwrap();

    assert_eq!(report.engines_tried.len(), 1);
    assert_eq!(report.engines_tried[0].engine_id, "beta");
    assert!(report.items.iter().all(|i| i.source_engine == "beta"));
}

#[tokio::test]
async fn first_success_keeps_vendor_order() {
    let alpha = MockServer::start().await;
    mock_engine_results(
        &alpha,
        json!([
            {"title": "low first", "url": "https://example.com/1", "content": "x", "score": 0.1},
            {"title": "high second", "url": "https://example.com/2", "content": "x", "score": 0.9},
        ]),
    )
    .await;

    let config = config_with(vec![local_engine("alpha", &alpha.uri())], &["alpha"]);
    let orchestrator = bootstrap(config).await;

    let report = orchestrator
        .run(
            SearchQuery::new("rust"),
            SearchOptions::default().with_strategy(StrategyKind::FirstSuccess),
        )
        .await
        .unwrap();

    // No post-sort for first-success: vendor order survives.
    assert_eq!(report.items[0].title, "low first");
}

#[tokio::test]
async fn report_serializes_to_the_machine_schema() {
    let alpha = MockServer::start().await;
    mock_engine_results(
        &alpha,
        json!([{"title": "a", "url": "https://example.com/a", "content": "x", "score": 0.4}]),
    )
    .await;

    let config = config_with(vec![local_engine("alpha", &alpha.uri())], &["alpha"]);
    let orchestrator = bootstrap(config).await;

    let report = orchestrator
        .run(
            SearchQuery::new("rust").with_include_raw(true),
            SearchOptions::default(),
        )
        .await
        .unwrap();
    let doc = serde_json::to_value(&report).unwrap();

    assert!(doc.get("query").is_some());
    assert!(doc.get("items").is_some());
    assert!(doc.get("enginesTried").is_some());
    assert!(doc.get("credits").is_some());
    assert!(doc.get("rawResponses").is_some());

    let item = &doc["items"][0];
    assert!(item.get("sourceEngine").is_some());
    let attempt = &doc["enginesTried"][0];
    assert!(attempt.get("engineId").is_some());
    let snapshot = &doc["credits"][0];
    assert!(snapshot.get("isExhausted").is_some());
}

#[tokio::test]
async fn parallel_fan_out_matches_input_order() {
    let beta = MockServer::start().await;
    // Delay the first engine so the second finishes before it.
    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_millis(150))
                .set_body_json(json!({"results": [
                    {"title": "slow", "url": "https://example.com/slow", "content": "x"},
                ]})),
        )
        .mount(&slow)
        .await;
    mock_engine_results(
        &beta,
        json!([{"title": "b", "url": "https://example.com/b", "content": "x"}]),
    )
    .await;

    let config = config_with(
        vec![
            local_engine("slow", &slow.uri()),
            local_engine("beta", &beta.uri()),
        ],
        &["slow", "beta"],
    );
    let orchestrator = bootstrap(config).await;

    let report = orchestrator
        .run(
            SearchQuery::new("rust"),
            SearchOptions::default().with_parallel(true),
        )
        .await
        .unwrap();

    let attempt_ids: Vec<_> = report
        .engines_tried
        .iter()
        .map(|a| a.engine_id.as_str())
        .collect();
    assert_eq!(attempt_ids, vec!["slow", "beta"]);
    // Unscored items keep input-engine order after the stable post-sort.
    assert_eq!(report.items[0].source_engine, "slow");
    assert_eq!(report.items[1].source_engine, "beta");
}
