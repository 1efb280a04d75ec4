//! `/run` (spec §4.5): executes a shell/JS/python command and either
//! shows its output or binds it to a variable.

use crate::ast::CommandNode;
use crate::context::ContextManager;
use crate::env::{Environment, Intent};
use crate::errors::{MlldError, MlldResult};
use crate::exec::{bash_helper_env, ExecLanguage, ExecRequest};
use crate::interpolation::{EscapingStrategy, InterpolationEngine, NullFileLoader};
use crate::value::{Value, ValueData, Variable};

use super::Evaluator;

fn exec_language(tag: Option<&str>) -> ExecLanguage {
    match tag.map(str::to_ascii_lowercase).as_deref() {
        Some("js") | Some("javascript") | Some("node") => ExecLanguage::Js,
        Some("python") | Some("py") => ExecLanguage::Python,
        _ => ExecLanguage::Sh,
    }
}

pub async fn eval_run(
    ev: &Evaluator,
    command: &CommandNode,
    assign_to: Option<&str>,
    env: &Environment,
    ctx: &mut ContextManager,
) -> MlldResult<()> {
    let loader = NullFileLoader;
    let language = exec_language(command.language.as_deref());
    let strategy = match language {
        ExecLanguage::Sh => EscapingStrategy::Shell,
        _ => EscapingStrategy::None,
    };
    let engine = InterpolationEngine::new(&loader, strategy);
    let source = engine.render(&command.parts, env, ev).await?.render();

    let request = ExecRequest {
        language,
        source,
        env_vars: bash_helper_env([]),
        cwd: None,
        timeout: None,
    };

    let result = ev.executor.execute(request).await?;

    if result.exit_code != 0 {
        return Err(MlldError::ExecNonZero { exit_code: result.exit_code, stderr: result.stderr.clone() });
    }

    match assign_to {
        Some(name) => {
            env.set(Variable::simple(name, Value::new(ValueData::CommandResult(result)))).await?;
        }
        None => {
            let _ = ctx;
            env.push_intent(Intent::Content(result.stdout)).await;
        }
    }

    Ok(())
}
