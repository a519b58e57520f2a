//! Credit Manager
//!
//! Per-engine quota tracking with monthly reset and durable state. The
//! manager is the single writer for the process: charges, snapshots and
//! initialization all serialize on one mutex, and the in-memory state is
//! authoritative; persistence is best-effort and never surfaces failures.

pub mod store;

pub use store::{CreditStore, JsonFileStore, MemoryStore};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::types::{CreditRecord, CreditSnapshot, CreditState, EngineId};

#[derive(Debug, Clone)]
struct EngineCredit {
    quota: u64,
    cost: u64,
    low_threshold_percent: u8,
}

pub struct CreditManager {
    engines: HashMap<EngineId, EngineCredit>,
    /// Declaration order of the engines, for stable snapshot output.
    order: Vec<EngineId>,
    state: tokio::sync::Mutex<CreditState>,
    store: Arc<dyn CreditStore>,
}

impl CreditManager {
    /// Build a manager over the enabled engines in `configs`.
    pub fn new<'a>(
        configs: impl IntoIterator<Item = &'a EngineConfig>,
        store: Arc<dyn CreditStore>,
    ) -> Self {
        let mut engines = HashMap::new();
        let mut order = Vec::new();
        for config in configs {
            order.push(config.id.clone());
            engines.insert(
                config.id.clone(),
                EngineCredit {
                    quota: config.monthly_quota,
                    cost: config.credit_cost_per_search,
                    low_threshold_percent: config.low_credit_threshold_percent,
                },
            );
        }
        Self {
            engines,
            order,
            state: tokio::sync::Mutex::new(CreditState::new()),
            store,
        }
    }

    /// Load persisted state, seed missing records, run the monthly
    /// rollover pass and persist once. Problems with the store are logged
    /// and leave the manager running on in-memory state.
    pub async fn initialize(&self) {
        let mut state = self.state.lock().await;

        *state = match self.store.load().await {
            Ok(loaded) => loaded,
            Err(error) => {
                warn!("failed to load credit state, starting empty: {error}");
                CreditState::new()
            }
        };

        let now = Utc::now();
        for id in &self.order {
            state.entry(id.clone()).or_insert_with(|| CreditRecord {
                used: 0,
                last_reset: now,
            });
        }

        for (id, record) in state.iter_mut() {
            if !same_month(record.last_reset, now) {
                debug!(engine = id.as_str(), used = record.used, "monthly credit rollover");
                record.used = 0;
                record.last_reset = now;
            }
        }

        if let Err(error) = self.store.save(&state).await {
            warn!("failed to persist credit state: {error}");
        }
    }

    /// Whether `engine_id` can afford one more search. Unknown engines
    /// cannot.
    pub async fn has_sufficient_credits(&self, engine_id: &str) -> bool {
        let Some(engine) = self.engines.get(engine_id) else {
            return false;
        };
        let state = self.state.lock().await;
        let used = state.get(engine_id).map_or(0, |record| record.used);
        used + engine.cost <= engine.quota
    }

    /// Atomically charge one search. Returns `false` without mutating
    /// anything when the engine is unknown or the charge would exceed the
    /// quota. Persistence failures are logged, never returned.
    pub async fn charge(&self, engine_id: &str) -> bool {
        let Some(engine) = self.engines.get(engine_id) else {
            return false;
        };

        let mut state = self.state.lock().await;
        let now = Utc::now();
        let record = state.entry(engine_id.to_string()).or_insert_with(|| CreditRecord {
            used: 0,
            last_reset: now,
        });

        if record.used + engine.cost > engine.quota {
            return false;
        }
        record.used += engine.cost;

        let used = record.used;
        let remaining = engine.quota - used;
        if engine.cost > 0 && remaining * 100 < u64::from(engine.low_threshold_percent) * engine.quota
        {
            warn!(
                engine = engine_id,
                remaining, quota = engine.quota, "engine is low on credits"
            );
        }

        if let Err(error) = self.store.save(&state).await {
            warn!(engine = engine_id, "failed to persist credit state: {error}");
        }
        true
    }

    /// Derived view over every tracked engine, in declaration order.
    pub async fn list_snapshots(&self) -> Vec<CreditSnapshot> {
        let state = self.state.lock().await;
        let now = Utc::now();
        self.order
            .iter()
            .filter_map(|id| {
                let engine = self.engines.get(id)?;
                let (used, last_reset) = state
                    .get(id)
                    .map_or((0, now), |record| (record.used, record.last_reset));
                let remaining = engine.quota.saturating_sub(used);
                Some(CreditSnapshot {
                    engine_id: id.clone(),
                    quota: engine.quota,
                    used,
                    remaining,
                    is_exhausted: remaining < engine.cost,
                    last_reset,
                })
            })
            .collect()
    }

    /// Engines whose remaining credits are below their advisory threshold.
    pub async fn low_credit_engines(&self) -> Vec<CreditSnapshot> {
        let snapshots = self.list_snapshots().await;
        snapshots
            .into_iter()
            .filter(|snapshot| {
                let threshold = self
                    .engines
                    .get(&snapshot.engine_id)
                    .map_or(20, |engine| engine.low_threshold_percent);
                snapshot.remaining * 100 < u64::from(threshold) * snapshot.quota
            })
            .collect()
    }
}

fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Months;
    use url::Url;

    fn engine_config(id: &str, quota: u64, cost: u64) -> EngineConfig {
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

    fn manager(configs: &[EngineConfig], store: Arc<dyn CreditStore>) -> CreditManager {
        CreditManager::new(configs.iter(), store)
    }

    #[tokio::test]
    async fn initialize_seeds_missing_records() {
        let configs = vec![engine_config("a", 10, 1), engine_config("b", 5, 1)];
        let manager = manager(&configs, Arc::new(MemoryStore::new()));
        manager.initialize().await;

        let snapshots = manager.list_snapshots().await;
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots.iter().all(|s| s.used == 0));
    }

    #[tokio::test]
    async fn monthly_rollover_resets_usage() {
        let last_month = Utc::now().checked_sub_months(Months::new(1)).unwrap();
        let mut seeded = CreditState::new();
        seeded.insert(
            "a".to_string(),
            CreditRecord {
                used: 42,
                last_reset: last_month,
            },
        );

        let configs = vec![engine_config("a", 100, 1)];
        let manager = manager(&configs, Arc::new(MemoryStore::seeded(seeded)));
        manager.initialize().await;

        let snapshot = &manager.list_snapshots().await[0];
        assert_eq!(snapshot.used, 0);
        assert_eq!(snapshot.remaining, 100);
        assert!(same_month(snapshot.last_reset, Utc::now()));
    }

    #[tokio::test]
    async fn same_month_usage_is_preserved() {
        let mut seeded = CreditState::new();
        seeded.insert(
            "a".to_string(),
            CreditRecord {
                used: 42,
                last_reset: Utc::now(),
            },
        );

        let configs = vec![engine_config("a", 100, 1)];
        let manager = manager(&configs, Arc::new(MemoryStore::seeded(seeded)));
        manager.initialize().await;

        assert_eq!(manager.list_snapshots().await[0].used, 42);
    }

    #[tokio::test]
    async fn charge_increments_by_cost_and_stops_at_quota() {
        let configs = vec![engine_config("a", 3, 2)];
        let manager = manager(&configs, Arc::new(MemoryStore::new()));
        manager.initialize().await;

        assert!(manager.has_sufficient_credits("a").await);
        assert!(manager.charge("a").await);
        assert_eq!(manager.list_snapshots().await[0].used, 2);

        // A second charge would exceed the quota of 3.
        assert!(!manager.has_sufficient_credits("a").await);
        assert!(!manager.charge("a").await);
        assert_eq!(manager.list_snapshots().await[0].used, 2);
    }

    #[tokio::test]
    async fn unknown_engines_never_have_credits() {
        let configs = vec![engine_config("a", 10, 1)];
        let manager = manager(&configs, Arc::new(MemoryStore::new()));
        manager.initialize().await;

        assert!(!manager.has_sufficient_credits("nope").await);
        assert!(!manager.charge("nope").await);
    }

    #[tokio::test]
    async fn zero_cost_engines_are_never_exhausted() {
        let configs = vec![engine_config("local", 100, 0)];
        let manager = manager(&configs, Arc::new(MemoryStore::new()));
        manager.initialize().await;

        for _ in 0..5 {
            assert!(manager.charge("local").await);
        }
        let snapshot = &manager.list_snapshots().await[0];
        assert_eq!(snapshot.used, 0);
        assert!(!snapshot.is_exhausted);
    }

    #[tokio::test]
    async fn exhaustion_reflects_cost() {
        let configs = vec![engine_config("a", 2, 2)];
        let manager = manager(&configs, Arc::new(MemoryStore::new()));
        manager.initialize().await;

        assert!(manager.charge("a").await);
        let snapshot = &manager.list_snapshots().await[0];
        assert_eq!(snapshot.remaining, 0);
        assert!(snapshot.is_exhausted);
    }

    #[tokio::test]
    async fn low_credit_listing_uses_threshold() {
        let configs = vec![engine_config("a", 10, 1)];
        let manager = manager(&configs, Arc::new(MemoryStore::new()));
        manager.initialize().await;

        for _ in 0..9 {
            assert!(manager.charge("a").await);
        }
        let low = manager.low_credit_engines().await;
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].remaining, 1);
    }

    #[tokio::test]
    async fn state_survives_via_store() {
        let store = Arc::new(MemoryStore::new());
        {
            let configs = vec![engine_config("a", 10, 1)];
            let manager = manager(&configs, store.clone());
            manager.initialize().await;
            assert!(manager.charge("a").await);
        }

        let configs = vec![engine_config("a", 10, 1)];
        let manager = manager(&configs, store);
        manager.initialize().await;
        assert_eq!(manager.list_snapshots().await[0].used, 1);
    }
}
