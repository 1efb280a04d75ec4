//! `/show` (spec §4.5): renders a value straight into the document.

use crate::ast::Node;
use crate::context::ContextManager;
use crate::env::{Environment, Intent};
use crate::errors::MlldResult;

use super::Evaluator;

pub async fn eval_show(ev: &Evaluator, value: &Node, env: &Environment, ctx: &mut ContextManager) -> MlldResult<()> {
    let rendered = ev.eval(value, env, ctx).await?;
    env.push_intent(Intent::Content(rendered.render())).await;
    Ok(())
}
