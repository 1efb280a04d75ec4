//! `/exe` (spec §4.5): defines a reusable function value, capturing its
//! defining scope, and invokes it by name.

use crate::ast::{ExeBody, Node, ParamDef};
use crate::context::ContextManager;
use crate::env::{Environment, ExeDef, ShadowEnvironment, ShadowLanguage};
use crate::errors::{MlldError, MlldResult};
use crate::exec::{bash_helper_env, ExecLanguage, ExecRequest};
use crate::hooks::HookTiming;
use crate::value::{Value, ValueData, Variable};

use super::Evaluator;

#[allow(clippy::too_many_arguments)]
pub async fn eval_exe_define(
    name: &str,
    params: &[ParamDef],
    body: &ExeBody,
    labels: &[String],
    retryable: bool,
    env: &Environment,
) -> MlldResult<()> {
    let lang = match body {
        ExeBody::Code(code) => ShadowLanguage::from_tag(&code.language),
        _ => None,
    };

    // Capture the shadow environment (sibling callables of this body's
    // language) as it stood just before this definition lands (spec
    // §4.2 `captureShadowEnvironment`, §4.5 "captured at definition
    // time"). This exe's own name isn't visible to itself.
    let shadow = match lang {
        Some(lang) => Some(env.shadow(lang).await.unwrap_or_default()),
        None => None,
    };

    let def = ExeDef {
        params: params.to_vec(),
        body: body.clone(),
        labels: labels.to_vec(),
        retryable,
        closure: env.clone(),
        shadow,
    };
    env.define_exe(name, def).await;
    // `/exe` also reserves the name in the plain variable namespace so
    // `@fnName` without a call resolves to something rather than
    // silently falling through to a parent scope's unrelated binding.
    let marker = Value::text(format!("<exe {name}>"));
    env.define(Variable::exe(name, marker.clone())).await;

    // Extend this scope's shadow map for the body's language so later
    // sibling `/exe` definitions (and future invocations of them) see
    // this one too (spec §4.2 "lexical scope").
    if let Some(lang) = lang {
        let mut shadow = env.shadow(lang).await.unwrap_or_default();
        shadow.insert(name, marker);
        env.set_shadow(lang, shadow).await;
    }
    Ok(())
}

pub async fn invoke_exe(
    ev: &Evaluator,
    name: &str,
    args: &[Value],
    caller_env: &Environment,
    ctx: &mut ContextManager,
) -> MlldResult<Value> {
    let def = caller_env.get_exe(name).await.map_err(|_| MlldError::VariableNotFound {
        name: name.to_string(),
        location: None,
    })?;

    let call_env = def.closure.child();
    bind_params(&def.params, args, &call_env, ev, caller_env, ctx).await?;

    // Install the shadow environment captured at definition time into
    // the call-time scope, ahead of running the body (spec §4.2
    // `setShadowEnv`, §4.5 "apply by installing into the child env just
    // before invocation").
    if let ExeBody::Code(code) = &def.body {
        if let (Some(lang), Some(shadow)) = (ShadowLanguage::from_tag(&code.language), &def.shadow) {
            call_env.set_shadow(lang, shadow.clone()).await;
        }
    }

    // Snapshot the hook registry before invoking: a hook body can itself
    // call `/exe` functions and re-enter this dispatch, and the registry's
    // mutex isn't reentrant.
    let hooks = ev.hooks.lock().await.clone();
    let first_arg = args.first().and_then(|v| v.as_text());
    hooks
        .dispatch(HookTiming::Before, "exe", Some(name), None, first_arg, caller_env, ctx, ev)
        .await;

    let result = match &def.body {
        ExeBody::Block(nodes) => eval_block_with_return(ev, nodes, &call_env, ctx).await,
        ExeBody::Template(parts) => {
            let loader = crate::interpolation::NullFileLoader;
            let engine = crate::interpolation::InterpolationEngine::new(&loader, crate::interpolation::EscapingStrategy::None);
            engine.render(parts, &call_env, ev).await
        }
        ExeBody::Code(code) => run_exe_code(ev, code, &def.params, &call_env, def.shadow.as_ref()).await,
        ExeBody::FunctionRef(target) => Box::pin(invoke_exe(ev, target, args, &call_env, ctx)).await,
    }?;

    hooks
        .dispatch(HookTiming::After, "exe", Some(name), None, first_arg, caller_env, ctx, ev)
        .await;

    Ok(result)
}

fn exec_language(tag: &str) -> ExecLanguage {
    match tag.to_ascii_lowercase().as_str() {
        "js" | "javascript" | "node" => ExecLanguage::Js,
        "python" | "py" => ExecLanguage::Python,
        _ => ExecLanguage::Sh,
    }
}

/// Runs an `/exe` body that's a bare language code block (spec §4.5: one
/// of the four body forms, alongside block/template/function-ref).
/// Bound parameters become visible to the script the same way `/run`
/// exposes variables: as environment entries plus `MLLD_IS_VARIABLE_*`/
/// `MLLD_TYPE_*` pairs.
async fn run_exe_code(
    ev: &Evaluator,
    code: &crate::ast::CodeNode,
    params: &[ParamDef],
    call_env: &Environment,
    shadow: Option<&ShadowEnvironment>,
) -> MlldResult<Value> {
    let mut bindings = Vec::with_capacity(params.len());
    for param in params {
        if let Ok(var) = call_env.get(&param.name).await {
            bindings.push((param.name.clone(), var.value));
        }
    }
    if let Some(shadow) = shadow {
        for (name, value) in &shadow.bindings {
            bindings.push((name.clone(), value.clone()));
        }
    }
    let env_vars = bash_helper_env(bindings.iter().map(|(name, value)| (name.as_str(), value)));

    let request = ExecRequest {
        language: exec_language(&code.language),
        source: code.source.clone(),
        env_vars,
        cwd: None,
        timeout: None,
    };

    let result = ev.executor.execute(request).await?;
    if result.exit_code != 0 {
        return Err(MlldError::ExecNonZero { exit_code: result.exit_code, stderr: result.stderr.clone() });
    }
    Ok(Value::new(ValueData::CommandResult(result)))
}

async fn bind_params(
    params: &[ParamDef],
    args: &[Value],
    call_env: &Environment,
    ev: &Evaluator,
    caller_env: &Environment,
    ctx: &mut ContextManager,
) -> MlldResult<()> {
    for (index, param) in params.iter().enumerate() {
        let value = match args.get(index) {
            Some(v) => v.clone(),
            None => match &param.default {
                Some(default_node) => ev.eval(default_node, caller_env, ctx).await?,
                None => {
                    return Err(MlldError::InvalidDirective {
                        message: format!("missing argument for parameter `{}`", param.name),
                        location: None,
                    })
                }
            },
        };
        call_env.define(Variable::simple(param.name.clone(), value)).await;
    }
    Ok(())
}

/// Runs an `/exe` block body, honoring an early `ExeReturn` node the
/// same way a function body honors `return`.
async fn eval_block_with_return(
    ev: &Evaluator,
    nodes: &[Node],
    env: &Environment,
    ctx: &mut ContextManager,
) -> MlldResult<Value> {
    let mut last = Value::null();
    for node in nodes {
        if let crate::ast::NodeKind::ExeReturn(inner) = &node.kind {
            return ev.eval(inner, env, ctx).await;
        }
        last = ev.eval(node, env, ctx).await?;
    }
    Ok(last)
}
