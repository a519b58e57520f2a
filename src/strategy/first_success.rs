//! First-Success Strategy
//!
//! Walks the effective order and stops at the first engine that both
//! succeeds and charges. Engines skipped for gating reasons before that
//! point are recorded; engines after it are neither attempted nor
//! recorded, and the winner's items are returned unmodified.

use async_trait::async_trait;

use crate::error::FailureReason;
use crate::types::{EngineAttempt, EngineId, SearchQuery};

use super::{Gate, SearchStrategy, StrategyContext, StrategyOutput, gate, run_engine};

#[derive(Default)]
pub struct FirstSuccessStrategy;

impl FirstSuccessStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SearchStrategy for FirstSuccessStrategy {
    async fn execute(
        &self,
        ctx: &StrategyContext,
        query: &SearchQuery,
        order: &[EngineId],
    ) -> StrategyOutput {
        let mut output = StrategyOutput::default();

        for engine_id in order {
            match gate(ctx, engine_id).await {
                Gate::NoProvider => {
                    output
                        .attempts
                        .push(EngineAttempt::failed(engine_id, FailureReason::NoProvider));
                }
                Gate::OutOfCredit => {
                    output
                        .attempts
                        .push(EngineAttempt::failed(engine_id, FailureReason::OutOfCredit));
                }
                Gate::Ready(provider) => {
                    let outcome = run_engine(ctx, engine_id, provider, query).await;
                    let succeeded = outcome.attempt.success;
                    output.attempts.push(outcome.attempt);
                    if succeeded {
                        output.results = outcome.items;
                        if let Some(raw) = outcome.raw {
                            output.raw_responses.insert(engine_id.clone(), raw);
                        }
                        break;
                    }
                }
            }
        }

        output
    }
}
