//! `/when` (spec §4.5): pattern-matches conditions against actions.
//! Decided open question: a `/when` with no matching pattern emits
//! nothing rather than raising an error (see `when_no_match_emits_nothing`).

use crate::ast::WhenNode;
use crate::context::ContextManager;
use crate::env::Environment;
use crate::errors::MlldResult;
use crate::value::Value;

use super::Evaluator;

pub async fn eval_when(ev: &Evaluator, when: &WhenNode, env: &Environment, ctx: &mut ContextManager) -> MlldResult<Value> {
    let mut last = Value::null();
    let mut matched_any = false;

    for pattern in &when.patterns {
        let matches = match &pattern.condition {
            Some(cond) => ev.eval(cond, env, ctx).await?.is_truthy(),
            None => true,
        };
        if !matches {
            continue;
        }

        matched_any = true;
        last = ev.eval(&pattern.action, env, ctx).await?;

        if when.first_only {
            break;
        }
    }

    let _ = matched_any;
    Ok(last)
}
