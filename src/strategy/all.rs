//! Fan-Out-All Strategy
//!
//! Queries every engine in the effective order. Sequential by default;
//! the parallel mode gates every engine first, runs the eligible ones
//! concurrently with every outcome reported, and rewrites both the merged
//! items and the attempts back into input order before returning.

use async_trait::async_trait;
use futures::future::join_all;

use crate::error::FailureReason;
use crate::types::{EngineAttempt, EngineId, SearchQuery, SearchResultItem};

use super::{Gate, SearchStrategy, StrategyContext, StrategyOutput, gate, run_engine};

pub struct AllStrategy {
    parallel: bool,
}

impl AllStrategy {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    async fn execute_sequential(
        &self,
        ctx: &StrategyContext,
        query: &SearchQuery,
        order: &[EngineId],
    ) -> StrategyOutput {
        let mut output = StrategyOutput::default();

        for engine_id in order {
            match gate(ctx, engine_id).await {
                Gate::NoProvider => {
                    output.attempts.push(EngineAttempt::failed(
                        engine_id,
                        FailureReason::NoProvider,
                    ));
                }
                Gate::OutOfCredit => {
                    output.attempts.push(EngineAttempt::failed(
                        engine_id,
                        FailureReason::OutOfCredit,
                    ));
                }
                Gate::Ready(provider) => {
                    let outcome = run_engine(ctx, engine_id, provider, query).await;
                    output.attempts.push(outcome.attempt);
                    output.results.extend(outcome.items);
                    if let Some(raw) = outcome.raw {
                        output.raw_responses.insert(engine_id.clone(), raw);
                    }
                }
            }
        }

        output
    }

    async fn execute_parallel(
        &self,
        ctx: &StrategyContext,
        query: &SearchQuery,
        order: &[EngineId],
    ) -> StrategyOutput {
        // Gate in input order first so ineligible engines are recorded
        // before any search runs, then fan the eligible ones out.
        let mut slots: Vec<Option<EngineAttempt>> = vec![None; order.len()];
        let mut eligible = Vec::new();

        for (index, engine_id) in order.iter().enumerate() {
            match gate(ctx, engine_id).await {
                Gate::NoProvider => {
                    slots[index] = Some(EngineAttempt::failed(
                        engine_id,
                        FailureReason::NoProvider,
                    ));
                }
                Gate::OutOfCredit => {
                    slots[index] = Some(EngineAttempt::failed(
                        engine_id,
                        FailureReason::OutOfCredit,
                    ));
                }
                Gate::Ready(provider) => {
                    eligible.push((index, engine_id, provider));
                }
            }
        }

        let searches = eligible.into_iter().map(|(index, engine_id, provider)| async move {
            let outcome = run_engine(ctx, engine_id, provider, query).await;
            (index, engine_id.clone(), outcome)
        });
        let outcomes = join_all(searches).await;

        let mut output = StrategyOutput::default();
        let mut item_slots: Vec<Vec<SearchResultItem>> =
            std::iter::repeat_with(Vec::new).take(order.len()).collect();

        for (index, engine_id, outcome) in outcomes {
            slots[index] = Some(outcome.attempt);
            item_slots[index] = outcome.items;
            if let Some(raw) = outcome.raw {
                output.raw_responses.insert(engine_id, raw);
            }
        }

        // Completion order is arbitrary; rewrite into input order.
        output.attempts = slots
            .into_iter()
            .map(|slot| slot.expect("every engine produces exactly one attempt"))
            .collect();
        output.results = item_slots.into_iter().flatten().collect();
        output
    }
}

#[async_trait]
impl SearchStrategy for AllStrategy {
    async fn execute(
        &self,
        ctx: &StrategyContext,
        query: &SearchQuery,
        order: &[EngineId],
    ) -> StrategyOutput {
        let mut output = if self.parallel {
            self.execute_parallel(ctx, query, order).await
        } else {
            self.execute_sequential(ctx, query, order).await
        };

        if let Some(limit) = query.limit {
            output.results.truncate(limit as usize);
        }
        output
    }
}
