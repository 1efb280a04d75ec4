//! Field-access chain resolution for `VariableReferenceWithTail` (spec
//! §4.1, §4.4).

use crate::ast::FieldAccess;
use crate::env::Environment;
use crate::errors::MlldResult;
use crate::value::Value;

use super::ExpressionEvaluator;

/// Walks a chain of `.name` / `[index]` / `[@dynamic]` accessors,
/// threading the base value's security descriptor through each step
/// (handled inside `Value::get_field`/`get_index`).
pub async fn resolve_field_chain(
    base: Value,
    fields: &[FieldAccess],
    env: &Environment,
    evaluator: &dyn ExpressionEvaluator,
) -> MlldResult<Value> {
    let mut current = base;
    for field in fields {
        current = match field {
            FieldAccess::Name(name) => current.get_field(name)?,
            FieldAccess::Index(idx) => current.get_index(*idx)?,
            FieldAccess::Dynamic(node) => {
                let key_value = evaluator.eval_node(node, env).await?;
                match key_value.as_text() {
                    Some(name) => current.get_field(name)?,
                    None => {
                        let idx = key_value.as_bool().map(|b| b as i64).unwrap_or(0);
                        current.get_index(idx)?
                    }
                }
            }
        };
    }
    Ok(current)
}
