//! `/loop` (spec §4.5): repeats its body until a condition holds, with
//! an optional iteration cap and inter-iteration pacing. An `ExeReturn`
//! node inside the body ends the loop early with that value, the same
//! `done`-style short-circuit `/exe` bodies use.

use crate::ast::{LoopLimit, LoopNode, Node, NodeKind};
use crate::context::{ContextManager, LoopFrame};
use crate::env::Environment;
use crate::errors::MlldResult;
use crate::value::Value;

use super::Evaluator;

pub async fn eval_loop(ev: &Evaluator, node: &LoopNode, env: &Environment, ctx: &mut ContextManager) -> MlldResult<Value> {
    let max_iterations = match node.limit {
        Some(LoopLimit::Count(n)) => Some(n),
        Some(LoopLimit::Endless) | None => None,
    };

    let mut iteration: u64 = 0;
    let mut last = Value::null();

    loop {
        if ev.eval(&node.until, env, ctx).await?.is_truthy() {
            break;
        }
        if let Some(max) = max_iterations {
            if iteration >= max {
                break;
            }
        }

        ctx.push_loop(LoopFrame { iteration, limit: max_iterations });
        let body_env = env.child();
        let outcome = run_body(ev, &node.body, &body_env, ctx).await;
        ctx.pop_loop();

        match outcome? {
            BodyOutcome::Completed(value) => last = value,
            BodyOutcome::Done(value) => {
                last = value;
                break;
            }
        }

        iteration += 1;
        if let Some(pacing) = node.pacing_ms {
            tokio::time::sleep(std::time::Duration::from_millis(pacing)).await;
        }
    }

    Ok(last)
}

enum BodyOutcome {
    Completed(Value),
    Done(Value),
}

async fn run_body(ev: &Evaluator, body: &[Node], env: &Environment, ctx: &mut ContextManager) -> MlldResult<BodyOutcome> {
    let mut last = Value::null();
    for node in body {
        if let NodeKind::ExeReturn(inner) = &node.kind {
            return Ok(BodyOutcome::Done(ev.eval(inner, env, ctx).await?));
        }
        last = ev.eval(node, env, ctx).await?;
    }
    Ok(BodyOutcome::Completed(last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Location, LiteralValue};

    fn literal_bool_after(calls_before_true: std::rc::Rc<std::cell::Cell<u32>>) -> Node {
        // Not used directly — kept simple by testing the count-limit path
        // instead of a stateful `until` condition.
        let _ = calls_before_true;
        Node::new(NodeKind::Literal(LiteralValue::Bool(false)), Location::default())
    }

    #[tokio::test]
    async fn stops_at_iteration_limit_when_until_never_true() {
        let ev = super::super::tests::test_evaluator();
        let env = Environment::root();
        let mut ctx = ContextManager::new();

        let until = literal_bool_after(std::rc::Rc::new(std::cell::Cell::new(0)));
        let node = LoopNode { limit: Some(LoopLimit::Count(3)), pacing_ms: None, until: Box::new(until), body: vec![] };

        eval_loop(&ev, &node, &env, &mut ctx).await.unwrap();
        assert!(ctx.is_balanced());
    }
}
