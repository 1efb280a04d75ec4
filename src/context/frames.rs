//! Frame shapes pushed onto the typed stacks in [`super::ContextManager`]
//! (spec §3 "Context manager", component C3).

use crate::value::Value;

/// Pushed for every directive evaluation; exposed as `@ctx`.
#[derive(Debug, Clone)]
pub struct OperationFrame {
    pub directive: String,
    pub label: Option<String>,
}

/// Pushed per pipeline stage; exposed as `@ctx.pipeline`/`@mx.pipeline`.
#[derive(Debug, Clone)]
pub struct PipelineFrame {
    pub stage: usize,
    pub function: String,
    pub attempt: u32,
    pub attempt_history: Vec<PipelineAttempt>,
}

#[derive(Debug, Clone)]
pub struct PipelineAttempt {
    pub attempt: u32,
    pub output: Value,
    pub hint: Option<Value>,
}

/// Pushed per `/for` iteration; exposed as `@mx.for` during the body.
/// `batch_index`/`batch_size` are only meaningful under `parallel N` —
/// sequential `/for` always runs batch 0 of size 1.
#[derive(Debug, Clone)]
pub struct ForFrame {
    pub index: usize,
    pub key: Option<Value>,
    pub value: Value,
    pub total: usize,
    pub batch_index: usize,
    pub batch_size: usize,
}

/// Pushed while a guard is evaluating a retry decision; exposed as
/// `@mx.hooks` during guard bodies.
#[derive(Debug, Clone)]
pub struct GuardRetryFrame {
    pub guard_name: String,
    pub denied: bool,
    pub deny_reason: Option<String>,
}

/// Pushed for a running `/loop`; exposed as `@mx.loop`.
#[derive(Debug, Clone)]
pub struct LoopFrame {
    pub iteration: u64,
    pub limit: Option<u64>,
}
