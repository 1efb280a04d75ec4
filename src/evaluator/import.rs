//! `/import` (spec §4.5, §4.9): resolves a module reference and binds
//! its exports, named or as a single namespace object.
//!
//! Module content is parsed as JSON (`{"name": <value>, ...}` exports).
//! mlld source re-parsing on import is out of scope for this crate since
//! the grammar itself is a separate collaborator (spec §1) — a host
//! that wants literal `.mld` imports resolves them to their compiled
//! export object before handing content to this evaluator.

use std::collections::HashSet;

use crate::ast::{ImportBinding, Node};
use crate::context::ContextManager;
use crate::env::Environment;
use crate::errors::{MlldError, MlldResult};
use crate::resolver::MAX_IMPORT_DEPTH;
use crate::value::{Value, Variable};

use super::Evaluator;

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::null(),
        serde_json::Value::Bool(b) => Value::new(crate::value::ValueData::Bool(*b)),
        serde_json::Value::Number(n) => Value::new(crate::value::ValueData::Number(n.as_f64().unwrap_or(0.0))),
        serde_json::Value::String(s) => Value::text(s.clone()),
        serde_json::Value::Array(items) => {
            Value::new(crate::value::ValueData::Array(items.iter().map(json_to_value).collect()))
        }
        serde_json::Value::Object(map) => {
            let mut fields = indexmap::IndexMap::new();
            for (k, v) in map {
                fields.insert(k.clone(), json_to_value(v));
            }
            Value::new(crate::value::ValueData::Object(fields))
        }
    }
}

pub async fn eval_import(
    ev: &Evaluator,
    source: &Node,
    bindings: &Option<Vec<ImportBinding>>,
    namespace_alias: &Option<String>,
    env: &Environment,
    ctx: &mut ContextManager,
) -> MlldResult<()> {
    let reference_value = ev.eval(source, env, ctx).await?;
    let reference = reference_value.render();

    // The active-import stack lives on the root `Environment`, not a
    // fresh `HashSet` per call (spec §4.9): a reference revisited while
    // its own resolution is still in flight is a real `IMPORT_CYCLE`,
    // reachable through nested `/import`s rather than only through
    // `ResolverManager::resolve` called directly.
    let depth = env.begin_import(&reference, MAX_IMPORT_DEPTH).await?;
    let mut visited = HashSet::new();
    let resolved = ev.resolvers.resolve(&reference, &mut visited, depth).await;
    env.end_import(&reference).await;
    let resolved = resolved?;

    let exports: serde_json::Value = serde_json::from_str(&resolved.content).map_err(|e| MlldError::ValidationFailed {
        message: format!("import `{reference}` did not resolve to a JSON export object: {e}"),
        location: None,
    })?;

    match bindings {
        Some(names) => {
            for binding in names {
                let field = exports.get(&binding.name).ok_or_else(|| MlldError::ModuleNotFound {
                    reference: format!("{reference}#{}", binding.name),
                })?;
                let local_name = binding.alias.clone().unwrap_or_else(|| binding.name.clone());
                if env.has(&local_name).await {
                    return Err(MlldError::ImportCollision { name: local_name });
                }
                env.define(Variable::simple(local_name, json_to_value(field))).await;
            }
        }
        None => {
            let alias = namespace_alias.clone().ok_or_else(|| MlldError::InvalidDirective {
                message: "namespace import requires an alias".to_string(),
                location: None,
            })?;
            if env.has(&alias).await {
                return Err(MlldError::ImportCollision { name: alias });
            }
            env.define(Variable::simple(alias, json_to_value(&exports))).await;
        }
    }

    Ok(())
}
