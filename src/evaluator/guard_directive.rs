//! `/guard` (spec §4.5, §4.8): registers a hook whose `when` body
//! resolves to an allow/deny/retry/transform decision.

use crate::ast::{HookMatcher, WhenNode};
use crate::context::ContextManager;
use crate::env::Environment;
use crate::errors::MlldResult;
use crate::hooks::{GuardDecision, GuardEntry, HookTiming};

use super::Evaluator;
use super::when::eval_when;

pub async fn eval_guard_define(
    ev: &Evaluator,
    name: &str,
    timing: crate::ast::HookTiming,
    matcher: &HookMatcher,
    when: &WhenNode,
) -> MlldResult<()> {
    let timing = match timing {
        crate::ast::HookTiming::Before => HookTiming::Before,
        crate::ast::HookTiming::After => HookTiming::After,
    };
    ev.guards
        .lock()
        .await
        .register(GuardEntry { name: name.to_string(), timing, matcher: matcher.clone(), when: when.clone() })
}

/// Evaluates a guard's `when` body into a [`GuardDecision`]. A truthy
/// match whose action renders to `"deny"`/`"retry"` drives that
/// decision; anything else allows. Evaluated on demand from
/// `GuardRegistry::evaluate` via the `GuardInvoker` trait.
pub async fn resolve_guard_decision(ev: &Evaluator, guard: &GuardEntry, env: &Environment, ctx: &mut ContextManager) -> MlldResult<GuardDecision> {
    let result = eval_when(ev, &guard.when, env, ctx).await?;
    match result.as_text() {
        Some("deny") => Ok(GuardDecision::Deny { reason: format!("guard `{}` denied", guard.name) }),
        Some("retry") => Ok(GuardDecision::Retry { hint: None }),
        _ if result.is_truthy() && !matches!(result.data, crate::value::ValueData::Null) => {
            Ok(GuardDecision::Transform { value: result })
        }
        _ => Ok(GuardDecision::Allow),
    }
}
