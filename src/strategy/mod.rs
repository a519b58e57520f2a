//! Execution Strategies
//!
//! The policy deciding how many and which providers to call for a single
//! query. Both strategies share the per-engine gating sequence: resolve
//! the provider (`no_provider` when absent), check credits
//! (`out_of_credit` when insufficient), run the search through the retry
//! engine, then charge; a failed post-success charge demotes the attempt
//! to `out_of_credit` and discards that provider's items.

mod all;
mod first_success;

pub use all::AllStrategy;
pub use first_success::FirstSuccessStrategy;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::cancel::CancelHandle;
use crate::credits::CreditManager;
use crate::error::FailureReason;
use crate::provider::SearchProvider;
use crate::registry::ProviderRegistry;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::types::{EngineAttempt, EngineId, SearchQuery, SearchResultItem, StrategyKind};

/// Collaborators shared by every strategy invocation.
#[derive(Clone)]
pub struct StrategyContext {
    pub registry: Arc<ProviderRegistry>,
    pub credits: Arc<CreditManager>,
    pub retry: RetryPolicy,
    pub cancel: CancelHandle,
}

/// Merged results plus one attempt record per consulted engine.
#[derive(Debug, Default)]
pub struct StrategyOutput {
    pub results: Vec<SearchResultItem>,
    pub attempts: Vec<EngineAttempt>,
    /// Raw vendor responses, populated only for `include_raw` queries.
    pub raw_responses: BTreeMap<EngineId, serde_json::Value>,
}

#[async_trait]
pub trait SearchStrategy: Send + Sync {
    async fn execute(
        &self,
        ctx: &StrategyContext,
        query: &SearchQuery,
        order: &[EngineId],
    ) -> StrategyOutput;
}

/// Construct the strategy for a run.
pub fn strategy_for(kind: StrategyKind, parallel: bool) -> Box<dyn SearchStrategy> {
    match kind {
        StrategyKind::All => Box::new(AllStrategy::new(parallel)),
        StrategyKind::FirstSuccess => Box::new(FirstSuccessStrategy::new()),
    }
}

/// Result of the per-engine precondition checks.
pub(crate) enum Gate {
    NoProvider,
    OutOfCredit,
    Ready(Arc<dyn SearchProvider>),
}

pub(crate) async fn gate(ctx: &StrategyContext, engine_id: &str) -> Gate {
    let Some(provider) = ctx.registry.get(engine_id) else {
        return Gate::NoProvider;
    };
    if !ctx.credits.has_sufficient_credits(engine_id).await {
        return Gate::OutOfCredit;
    }
    Gate::Ready(provider)
}

/// Outcome of invoking one gated engine.
pub(crate) struct EngineOutcome {
    pub attempt: EngineAttempt,
    pub items: Vec<SearchResultItem>,
    pub raw: Option<serde_json::Value>,
}

/// Invoke a gated provider through the retry engine and charge credits on
/// success.
pub(crate) async fn run_engine(
    ctx: &StrategyContext,
    engine_id: &str,
    provider: Arc<dyn SearchProvider>,
    query: &SearchQuery,
) -> EngineOutcome {
    let executor = RetryExecutor::new(ctx.retry.clone()).with_cancel(ctx.cancel.clone());

    match executor.execute(engine_id, || provider.search(query)).await {
        Ok(response) => {
            if ctx.credits.charge(engine_id).await {
                debug!(
                    engine = engine_id,
                    items = response.items.len(),
                    took_ms = response.took_ms,
                    "engine succeeded"
                );
                EngineOutcome {
                    attempt: EngineAttempt::ok(engine_id),
                    items: response.items,
                    raw: response.raw,
                }
            } else {
                debug!(engine = engine_id, "charge failed after successful search");
                EngineOutcome {
                    attempt: EngineAttempt::failed(engine_id, FailureReason::OutOfCredit),
                    items: Vec::new(),
                    raw: None,
                }
            }
        }
        Err(error) => {
            debug!(engine = engine_id, "engine failed: {error}");
            EngineOutcome {
                attempt: EngineAttempt::failed(engine_id, error.reason()),
                items: Vec::new(),
                raw: None,
            }
        }
    }
}
