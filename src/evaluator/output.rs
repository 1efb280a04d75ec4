//! `/output` (spec §4.5, §6 "state:// sinks"): writes a value to
//! stdout, a file path, or a `state://` sink, optionally appending.
//!
//! Decided open question: a `.jsonl` append target rejects any value
//! that can't round-trip through one JSON line at the evaluator level,
//! carrying the directive's own location rather than surfacing a later,
//! harder-to-place serialization failure. A bare `.json` target never
//! accepts `append` at all — appending text onto a single JSON document
//! doesn't produce valid JSON, unlike `.jsonl`'s one-object-per-line
//! shape, so there's no serialization this crate could do that would
//! leave the sink parseable afterward.

use crate::ast::{Location, Node, OutputTarget};
use crate::context::ContextManager;
use crate::env::{Environment, Intent, StateWrite, StateWriteTarget};
use crate::errors::{MlldError, MlldResult};
use crate::interpolation::{EscapingStrategy, InterpolationEngine, NullFileLoader};

use super::Evaluator;

pub async fn eval_output(
    ev: &Evaluator,
    value_node: &Node,
    target: &OutputTarget,
    append: bool,
    location: &Location,
    env: &Environment,
    ctx: &mut ContextManager,
) -> MlldResult<()> {
    let value = ev.eval(value_node, env, ctx).await?;

    match target {
        OutputTarget::Stdout => {
            env.push_intent(Intent::Content(value.render())).await;
        }
        OutputTarget::File(path_parts) => {
            let loader = NullFileLoader;
            let engine = InterpolationEngine::new(&loader, EscapingStrategy::None);
            let path = engine.render(path_parts, env, ev).await?.render();

            if append && path.ends_with(".json") {
                return Err(MlldError::ValidationFailed {
                    message: "a .json sink cannot be appended to; use .jsonl".to_string(),
                    location: Some(crate::errors::Location::from(location)),
                });
            }
            if append && path.ends_with(".jsonl") && !value.is_jsonl_serializable() {
                return Err(MlldError::ValidationFailed {
                    message: format!("value of type `{}` cannot be appended to a .jsonl sink", value.type_name()),
                    location: Some(crate::errors::Location::from(location)),
                });
            }

            ev.file_writer.write(&path, &value.render(), append).await?;
            env.push_state_write(StateWrite { key: path, value, append, target: StateWriteTarget::File }).await;
        }
        OutputTarget::State(key) => {
            env.push_state_write(StateWrite {
                key: key.clone(),
                value,
                append,
                target: StateWriteTarget::State,
            })
            .await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::context::ContextManager;
    use crate::interpolation::FileWriter;
    use crate::value::CommandResultValue;

    fn lit(s: &str) -> Node {
        Node::new(crate::ast::NodeKind::Literal(crate::ast::LiteralValue::String(s.to_string())), Location::default())
    }

    struct NullExecutor;

    #[async_trait]
    impl crate::exec::CommandExecutor for NullExecutor {
        async fn execute(&self, _request: crate::exec::ExecRequest) -> MlldResult<CommandResultValue> {
            Ok(CommandResultValue { stdout: String::new(), stderr: String::new(), exit_code: 0 })
        }
    }

    struct AcceptingFileWriter;

    #[async_trait]
    impl FileWriter for AcceptingFileWriter {
        async fn write(&self, _path: &str, _content: &str, _append: bool) -> MlldResult<()> {
            Ok(())
        }
    }

    fn evaluator_with_file_writer() -> Evaluator {
        Evaluator::new(
            Arc::new(NullFileLoader),
            Arc::new(AcceptingFileWriter),
            Arc::new(NullExecutor),
            crate::resolver::ResolverManager::new(),
            crate::effects::DocumentFormat::Markdown,
        )
    }

    #[tokio::test]
    async fn appending_to_a_dot_json_target_is_rejected() {
        let ev = super::super::tests::test_evaluator();
        let env = Environment::root();
        let mut ctx = ContextManager::new();

        let target = OutputTarget::File(vec![crate::ast::InterpolationPart::Text("out.json".to_string())]);
        let err = eval_output(&ev, &lit("x"), &target, true, &Location::default(), &env, &mut ctx).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn file_target_is_recorded_as_a_file_write_not_a_state_write() {
        let ev = evaluator_with_file_writer();
        let env = Environment::root();
        let mut ctx = ContextManager::new();

        let target = OutputTarget::File(vec![crate::ast::InterpolationPart::Text("/tmp/mlld-out.txt".to_string())]);
        eval_output(&ev, &lit("x"), &target, false, &Location::default(), &env, &mut ctx).await.unwrap();

        let drained = env.drain_state_writes().await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].target, StateWriteTarget::File);
    }

    #[tokio::test]
    async fn a_file_target_with_no_writer_wired_in_surfaces_the_writer_error() {
        let ev = super::super::tests::test_evaluator();
        let env = Environment::root();
        let mut ctx = ContextManager::new();

        let target = OutputTarget::File(vec![crate::ast::InterpolationPart::Text("/tmp/mlld-out.txt".to_string())]);
        let err = eval_output(&ev, &lit("x"), &target, false, &Location::default(), &env, &mut ctx).await.unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[tokio::test]
    async fn state_target_is_recorded_as_a_state_write() {
        let ev = super::super::tests::test_evaluator();
        let env = Environment::root();
        let mut ctx = ContextManager::new();

        let target = OutputTarget::State("k".to_string());
        eval_output(&ev, &lit("x"), &target, false, &Location::default(), &env, &mut ctx).await.unwrap();

        let drained = env.drain_state_writes().await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].target, StateWriteTarget::State);
    }
}
