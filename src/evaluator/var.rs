//! `/var` (spec §4.5): binds a value, optionally appending onto an
//! existing binding (`+=`) or marking it a tool collection.

use crate::ast::{AugmentedOp, Node};
use crate::context::ContextManager;
use crate::env::Environment;
use crate::errors::{MlldError, MlldResult};
use crate::value::{Value, Variable};

use super::Evaluator;

#[allow(clippy::too_many_arguments)]
pub async fn eval_var(
    ev: &Evaluator,
    name: &str,
    value_node: &Node,
    augmented: Option<AugmentedOp>,
    is_tools: bool,
    labels: &[String],
    env: &Environment,
    ctx: &mut ContextManager,
) -> MlldResult<()> {
    let mut value = ev.eval(value_node, env, ctx).await?;

    if !labels.is_empty() {
        let mut security = value.security.clone();
        security.labels.extend(labels.iter().cloned());
        value = Value::with_security(value.data, security);
    }

    let bound = match augmented {
        Some(AugmentedOp::Append) => {
            let existing = env.get(name).await.map_err(|_| MlldError::VariableNotFound {
                name: name.to_string(),
                location: None,
            })?;
            existing.value.concat(&value)?
        }
        None => value,
    };

    let variable = if is_tools {
        require_tools_shape(&bound)?;
        Variable::tools(name, bound)
    } else {
        Variable::simple(name, bound)
    };

    env.set(variable).await
}

/// `/var ... tools` must bind an object whose fields are callable
/// references, so downstream `EXPOSE_MISSING_REQUIRED`-style checks in
/// `evaluator::tools` have something to validate against.
fn require_tools_shape(value: &Value) -> MlldResult<()> {
    match &value.data {
        crate::value::ValueData::Object(_) => Ok(()),
        other => Err(MlldError::ToolCollectionInvalid {
            message: format!("tools binding must be an object, got {}", describe(other)),
        }),
    }
}

fn describe(data: &crate::value::ValueData) -> &'static str {
    match data {
        crate::value::ValueData::Null => "null",
        crate::value::ValueData::Bool(_) => "boolean",
        crate::value::ValueData::Number(_) => "number",
        crate::value::ValueData::Text(_) => "text",
        crate::value::ValueData::Array(_) => "array",
        crate::value::ValueData::Object(_) => "object",
        crate::value::ValueData::Path(_) => "path",
        crate::value::ValueData::CommandResult(_) => "command-result",
        crate::value::ValueData::ToolCollection(_) => "tools",
    }
}
