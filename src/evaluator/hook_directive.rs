//! `/hook` (spec §4.5, §4.8): registers a before/after hook body against
//! an operation/function/label matcher. Dispatch itself happens from
//! `run`/`exe` evaluation, which calls into `Evaluator::hooks`.

use crate::ast::{HookMatcher, Node};
use crate::context::ContextManager;
use crate::env::Environment;
use crate::errors::MlldResult;
use crate::hooks::{HookEntry, HookTiming};

use super::Evaluator;

pub async fn eval_hook_define(
    ev: &Evaluator,
    name: &str,
    timing: crate::ast::HookTiming,
    matcher: &HookMatcher,
    body: &[Node],
    env: &Environment,
) -> MlldResult<()> {
    let timing = convert_timing(timing);
    ev.hook_bodies.lock().await.insert(name.to_string(), (body.to_vec(), env.clone()));
    ev.hooks
        .lock()
        .await
        .register(HookEntry { name: name.to_string(), timing, matcher: matcher.clone() })
}

fn convert_timing(timing: crate::ast::HookTiming) -> HookTiming {
    match timing {
        crate::ast::HookTiming::Before => HookTiming::Before,
        crate::ast::HookTiming::After => HookTiming::After,
    }
}

/// Runs a registered hook's stored body to completion, discarding its
/// value (hooks run for effect, not for a return value).
pub async fn run_hook_body(ev: &Evaluator, name: &str, ctx: &mut ContextManager) -> MlldResult<()> {
    let stored = ev.hook_bodies.lock().await.get(name).cloned();
    let Some((body, closure_env)) = stored else {
        return Ok(());
    };
    let body_env = closure_env.child();
    for node in &body {
        ev.eval(node, &body_env, ctx).await?;
    }
    Ok(())
}
