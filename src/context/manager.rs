//! Typed context stacks backing the `@ctx`/`@mx` read-only views (spec
//! §4.3, component C3).
//!
//! Each stack tracks one kind of nested evaluation frame. Directive
//! evaluators push on entry and pop on exit (including on error, via
//! RAII guards) rather than threading frame state through every call
//! signature — mirrors how `just-bash`'s interpreter keeps a handful of
//! parallel `Vec<_>` stacks on its state struct instead of one big enum.

use indexmap::IndexMap;

use super::frames::{ForFrame, GuardRetryFrame, LoopFrame, OperationFrame, PipelineFrame};
use crate::errors::{MlldError, MlldResult};
use crate::value::{Value, ValueData};

/// Depths of every sub-stack at a point in time, compared before and after
/// an operation frame's lifetime to catch an unbalanced push/pop (spec
/// §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextDepth {
    pipelines: usize,
    for_frames: usize,
    loops: usize,
    guard_retries: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    operations: Vec<OperationFrame>,
    pipelines: Vec<PipelineFrame>,
    for_frames: Vec<ForFrame>,
    loops: Vec<LoopFrame>,
    guard_retries: Vec<GuardRetryFrame>,
    hook_errors: Vec<String>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_operation(&mut self, frame: OperationFrame) {
        self.operations.push(frame);
    }

    pub fn pop_operation(&mut self) {
        self.operations.pop();
    }

    pub fn push_pipeline(&mut self, frame: PipelineFrame) {
        self.pipelines.push(frame);
    }

    pub fn pop_pipeline(&mut self) -> Option<PipelineFrame> {
        self.pipelines.pop()
    }

    pub fn current_pipeline_mut(&mut self) -> Option<&mut PipelineFrame> {
        self.pipelines.last_mut()
    }

    pub fn push_for(&mut self, frame: ForFrame) {
        self.for_frames.push(frame);
    }

    pub fn pop_for(&mut self) {
        self.for_frames.pop();
    }

    pub fn push_loop(&mut self, frame: LoopFrame) {
        self.loops.push(frame);
    }

    pub fn pop_loop(&mut self) {
        self.loops.pop();
    }

    pub fn push_guard_retry(&mut self, frame: GuardRetryFrame) {
        self.guard_retries.push(frame);
    }

    pub fn pop_guard_retry(&mut self) {
        self.guard_retries.pop();
    }

    pub fn record_hook_error(&mut self, message: impl Into<String>) {
        self.hook_errors.push(message.into());
    }

    /// Hook errors recorded on this manager, used to merge a cloned
    /// per-item `ContextManager` (from a concurrent `/for` batch member)
    /// back into the batch's shared one (spec §5).
    pub fn hook_errors(&self) -> &[String] {
        &self.hook_errors
    }

    /// Depth check used to enforce stack-balance invariants (spec §8).
    pub fn is_balanced(&self) -> bool {
        self.operations.is_empty()
            && self.pipelines.is_empty()
            && self.for_frames.is_empty()
            && self.loops.is_empty()
            && self.guard_retries.is_empty()
    }

    pub fn depth_snapshot(&self) -> ContextDepth {
        ContextDepth {
            pipelines: self.pipelines.len(),
            for_frames: self.for_frames.len(),
            loops: self.loops.len(),
            guard_retries: self.guard_retries.len(),
        }
    }

    /// `pushOperation`/`popOperation` must match FILO (spec §4.3): anything
    /// pushed onto a sub-stack while an operation frame is live must be
    /// popped before the frame is. A mismatch here means a directive
    /// evaluator bailed out through an early return without unwinding its
    /// own sub-stack push, which would otherwise corrupt every `@ctx`/`@mx`
    /// read downstream of it.
    pub fn check_balanced_since(&self, before: ContextDepth) -> MlldResult<()> {
        let after = self.depth_snapshot();
        if after == before {
            Ok(())
        } else {
            Err(MlldError::ContextImbalance {
                message: format!(
                    "sub-stacks left unbalanced across an operation frame: \
                     pipelines {}->{}, for {}->{}, loops {}->{}, guard_retries {}->{}",
                    before.pipelines,
                    after.pipelines,
                    before.for_frames,
                    after.for_frames,
                    before.loops,
                    after.loops,
                    before.guard_retries,
                    after.guard_retries,
                ),
            })
        }
    }

    /// Renders the live top of each stack into the `@ctx` object (spec
    /// §4.3: `@ctx.op.type`, `@ctx.pipe.stage`, `@ctx.isPipeline`).
    pub fn ctx_view(&self) -> Value {
        let mut fields = IndexMap::new();

        if let Some(op) = self.operations.last() {
            let mut op_obj = IndexMap::new();
            op_obj.insert("type".to_string(), Value::text(op.directive.clone()));
            if let Some(label) = &op.label {
                op_obj.insert("label".to_string(), Value::text(label.clone()));
            }
            fields.insert("op".to_string(), Value::new(ValueData::Object(op_obj)));
        }
        fields.insert("isPipeline".to_string(), Value::new(ValueData::Bool(!self.pipelines.is_empty())));
        if let Some(pf) = self.pipelines.last() {
            let mut pipe = IndexMap::new();
            pipe.insert("stage".to_string(), Value::new(ValueData::Number(pf.stage as f64)));
            pipe.insert("function".to_string(), Value::text(pf.function.clone()));
            pipe.insert("attempt".to_string(), Value::new(ValueData::Number(pf.attempt as f64)));
            fields.insert("pipe".to_string(), Value::new(ValueData::Object(pipe)));
        }

        Value::new(ValueData::Object(fields))
    }

    /// Renders cross-cutting runtime metadata into the `@mx` object
    /// (spec §4.3: `@mx.loop`, `@mx.for`, `@mx.hooks.errors`, `@mx.taint`,
    /// `@mx.key`).
    pub fn mx_view(&self) -> Value {
        let mut fields = IndexMap::new();

        let hook_errors: Vec<Value> = self.hook_errors.iter().map(|e| Value::text(e.clone())).collect();
        let mut hooks = IndexMap::new();
        hooks.insert("errors".to_string(), Value::new(ValueData::Array(hook_errors)));
        fields.insert("hooks".to_string(), Value::new(ValueData::Object(hooks)));

        if let Some(lp) = self.loops.last() {
            let mut loop_obj = IndexMap::new();
            loop_obj.insert("iteration".to_string(), Value::new(ValueData::Number(lp.iteration as f64)));
            loop_obj.insert(
                "limit".to_string(),
                lp.limit.map(|l| Value::new(ValueData::Number(l as f64))).unwrap_or_else(Value::null),
            );
            loop_obj.insert("active".to_string(), Value::new(ValueData::Bool(true)));
            fields.insert("loop".to_string(), Value::new(ValueData::Object(loop_obj)));
        }

        if let Some(lf) = self.for_frames.last() {
            let mut for_obj = IndexMap::new();
            for_obj.insert("index".to_string(), Value::new(ValueData::Number(lf.index as f64)));
            for_obj.insert("total".to_string(), Value::new(ValueData::Number(lf.total as f64)));
            for_obj.insert("batchIndex".to_string(), Value::new(ValueData::Number(lf.batch_index as f64)));
            for_obj.insert("batchSize".to_string(), Value::new(ValueData::Number(lf.batch_size as f64)));
            fields.insert("for".to_string(), Value::new(ValueData::Object(for_obj)));
            if let Some(key) = &lf.key {
                fields.insert("key".to_string(), key.clone());
            }
        }

        let tainted = self.for_frames.last().map(|lf| lf.value.security.tainted).unwrap_or(false);
        fields.insert("taint".to_string(), Value::new(ValueData::Bool(tainted)));

        if let Some(gr) = self.guard_retries.last() {
            let mut guard = IndexMap::new();
            guard.insert("name".to_string(), Value::text(gr.guard_name.clone()));
            guard.insert("denied".to_string(), Value::new(ValueData::Bool(gr.denied)));
            fields.insert("guard".to_string(), Value::new(ValueData::Object(guard)));
        }

        Value::new(ValueData::Object(fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_stack_after_matched_push_pop() {
        let mut ctx = ContextManager::new();
        ctx.push_operation(OperationFrame { directive: "var".into(), label: None });
        ctx.pop_operation();
        assert!(ctx.is_balanced());
    }

    #[test]
    fn ctx_view_reflects_current_operation() {
        let mut ctx = ContextManager::new();
        ctx.push_operation(OperationFrame { directive: "show".into(), label: None });
        let view = ctx.ctx_view();
        assert_eq!(view.get_field("op").unwrap().get_field("type").unwrap().as_text(), Some("show"));
        assert_eq!(view.get_field("isPipeline").unwrap().as_bool(), Some(false));
    }

    #[test]
    fn unpopped_sub_stack_is_a_context_imbalance() {
        let mut ctx = ContextManager::new();
        let before = ctx.depth_snapshot();
        ctx.push_for(ForFrame { index: 0, total: 1, batch_index: 0, batch_size: 1, key: None, value: Value::null() });
        let err = ctx.check_balanced_since(before).unwrap_err();
        assert_eq!(err.code(), "CONTEXT_IMBALANCE");
    }

    #[test]
    fn mx_view_exposes_hook_errors() {
        let mut ctx = ContextManager::new();
        ctx.record_hook_error("boom");
        let view = ctx.mx_view();
        let hooks = view.get_field("hooks").unwrap();
        let errors = hooks.get_field("errors").unwrap();
        assert_eq!(errors.get_index(0).unwrap().as_text(), Some("boom"));
    }
}
