//! Pipeline stage execution loop (spec §4.7, component C7).

use async_trait::async_trait;

use crate::ast::{EffectStageKind, PipelineStageNode};
use crate::context::{ContextManager, PipelineAttempt, PipelineFrame};
use crate::env::{Environment, Intent};
use crate::errors::{MlldError, MlldResult};
use crate::interpolation::ExpressionEvaluator;
use crate::value::Value;

use super::signals::{PipelineSignal, StageOutcome};

/// Invokes the callable named by a `Call` stage. Implemented by the
/// evaluator, which knows how to resolve `/exe` bindings and run them.
#[async_trait]
pub trait StageInvoker: Send + Sync {
    async fn invoke(
        &self,
        callable: &str,
        variant: Option<&str>,
        args: &[Value],
        input: &Value,
        env: &Environment,
    ) -> MlldResult<StageOutcome>;

    /// Whether `callable`'s source `/exe` was marked `retryable` (spec
    /// §4.7 "Retry enforcement"). Defaults to `true` so fakes that only
    /// care about values/signals (as most of this module's tests do)
    /// don't need to implement it.
    async fn is_retryable(&self, _callable: &str, _env: &Environment) -> bool {
        true
    }
}

pub struct PipelineEngine {
    /// Attempts allowed per stage before `PIPELINE_RETRY_EXHAUSTED`.
    pub max_attempts: u32,
}

impl Default for PipelineEngine {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Outcome of running a single `Call` stage to completion.
enum CallStageResult {
    /// Feed this value into the next stage.
    Advance(Value),
    /// A `done` signal fired — short-circuit the whole pipeline with
    /// this value, skipping any remaining stages.
    ShortCircuit(Value),
}

impl PipelineEngine {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Runs `input` through every stage in order. `Effect` stages never
    /// fail the pipeline on their own; `Call` stages may retry, may
    /// short-circuit with `done`, or may be skipped with `continue`.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        input: Value,
        stages: &[PipelineStageNode],
        invoker: &dyn StageInvoker,
        evaluator: &dyn ExpressionEvaluator,
        env: &Environment,
        ctx: &mut ContextManager,
    ) -> MlldResult<Value> {
        let mut current = input;

        for (stage_index, stage) in stages.iter().enumerate() {
            match stage {
                PipelineStageNode::Call { callable, variant, args } => {
                    match self
                        .run_call_stage(
                            stage_index,
                            callable,
                            variant.as_deref(),
                            args,
                            &current,
                            invoker,
                            evaluator,
                            env,
                            ctx,
                        )
                        .await?
                    {
                        CallStageResult::Advance(value) => current = value,
                        CallStageResult::ShortCircuit(value) => return Ok(value),
                    }
                }
                PipelineStageNode::Effect { kind, arg } => {
                    self.run_effect_stage(*kind, arg.as_deref(), &current, env).await?;
                }
                PipelineStageNode::ParseMode(_) => {}
            }
        }

        Ok(current)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_call_stage(
        &self,
        stage_index: usize,
        callable: &str,
        variant: Option<&str>,
        args: &[crate::ast::Node],
        input: &Value,
        invoker: &dyn StageInvoker,
        evaluator: &dyn ExpressionEvaluator,
        env: &Environment,
        ctx: &mut ContextManager,
    ) -> MlldResult<CallStageResult> {
        let mut attempt: u32 = 1;
        let mut history: Vec<PipelineAttempt> = Vec::new();
        // Literal stage args (spec §4.7, `@x | @transform("suffix")`) are
        // evaluated once per stage, ahead of input/retries — re-evaluating
        // them on every retry would let a side-effecting arg expression
        // run more than once per attempt.
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(evaluator.eval_node(arg, env).await?);
        }

        loop {
            ctx.push_pipeline(PipelineFrame {
                stage: stage_index,
                function: callable.to_string(),
                attempt,
                attempt_history: history.clone(),
            });

            let outcome = invoker.invoke(callable, variant, &arg_values, input, env).await;
            ctx.pop_pipeline();

            match outcome? {
                StageOutcome::Value(value) => {
                    history.push(PipelineAttempt { attempt, output: value.clone(), hint: None });
                    return Ok(CallStageResult::Advance(value));
                }
                StageOutcome::Signal(PipelineSignal::Continue(_)) => {
                    return Ok(CallStageResult::Advance(input.clone()));
                }
                StageOutcome::Signal(PipelineSignal::Done(done)) => {
                    return Ok(CallStageResult::ShortCircuit(done.value));
                }
                StageOutcome::Signal(PipelineSignal::Retry(retry)) => {
                    if !invoker.is_retryable(callable, env).await {
                        return Err(MlldError::RetryDenied { stage: stage_index, function: callable.to_string() });
                    }
                    history.push(PipelineAttempt {
                        attempt,
                        output: input.clone(),
                        hint: retry.hint.clone(),
                    });
                    if attempt >= self.max_attempts {
                        return Err(MlldError::PipelineRetryExhausted {
                            stage: stage_index,
                            function: callable.to_string(),
                            attempts: attempt,
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn run_effect_stage(
        &self,
        kind: EffectStageKind,
        _arg: Option<&crate::ast::Node>,
        current: &Value,
        env: &Environment,
    ) -> MlldResult<()> {
        match kind {
            EffectStageKind::Show => {
                env.push_intent(Intent::Content(current.render())).await;
            }
            EffectStageKind::Log => {
                tracing::info!(value = %current.render(), "pipeline log stage");
            }
            EffectStageKind::Output => {
                env.push_state_write(crate::env::StateWrite {
                    key: "pipeline".to_string(),
                    value: current.clone(),
                    append: false,
                    target: crate::env::StateWriteTarget::State,
                })
                .await;
            }
        }
        Ok(())
    }
}
