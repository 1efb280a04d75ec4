//! Interpolation engine: renders `Text`/`VariableRef`/`FileRef`/
//! `Expression` parts into a single value, threading security
//! descriptors and applying the target's [`EscapingStrategy`] (spec
//! §4.4, component C4).

pub mod escaping;
pub mod fields;
pub mod file_refs;

use async_trait::async_trait;

use crate::ast::{InterpolationPart, Node};
use crate::env::Environment;
use crate::errors::{MlldError, MlldResult};
use crate::value::{SecurityDescriptor, Value, ValueData};

pub use escaping::EscapingStrategy;
pub use file_refs::{FileLoader, FileWriter, NullFileLoader, NullFileWriter};

/// Evaluates an expression-position AST node to a value. Implemented by
/// `evaluator::Evaluator`; kept as a trait here so this module doesn't
/// depend back on the evaluator crate module (expressions embedded in
/// interpolated strings need full expression evaluation, e.g. `@x + 1`).
#[async_trait]
pub trait ExpressionEvaluator: Send + Sync {
    async fn eval_node(&self, node: &Node, env: &Environment) -> MlldResult<Value>;
}

/// Whether a missing reference inside interpolated text recovers to an
/// empty string or is fatal (spec §4.4, §7, §9 `strict`).
fn is_missing_reference(err: &MlldError) -> bool {
    matches!(err, MlldError::VariableNotFound { .. } | MlldError::FieldNotFound { .. } | MlldError::FieldOutOfBounds { .. })
}

pub struct InterpolationEngine<'a> {
    pub loader: &'a dyn FileLoader,
    pub strategy: EscapingStrategy,
    pub strict: bool,
}

impl<'a> InterpolationEngine<'a> {
    /// Strict by default: most call sites interpolate inside directives
    /// where a missing variable should be fatal. `with_strict` opts a
    /// caller into the recovering, non-strict mode (spec §9 `strict: bool`).
    pub fn new(loader: &'a dyn FileLoader, strategy: EscapingStrategy) -> Self {
        Self { loader, strategy, strict: true }
    }

    pub fn with_strict(loader: &'a dyn FileLoader, strategy: EscapingStrategy, strict: bool) -> Self {
        Self { loader, strategy, strict }
    }

    /// Renders a sequence of parts into one text [`Value`], unioning the
    /// security descriptor of every part that contributed.
    pub async fn render(
        &self,
        parts: &[InterpolationPart],
        env: &Environment,
        evaluator: &dyn ExpressionEvaluator,
    ) -> MlldResult<Value> {
        let mut out = String::new();
        let mut security = SecurityDescriptor::new();

        for part in parts {
            let rendered = self.render_part(part, env, evaluator).await?;
            out.push_str(&self.strategy.apply(&rendered.render()));
            security = security.merge(&rendered.security);
        }

        Ok(Value::with_security(ValueData::Text(out), security))
    }

    async fn render_part(
        &self,
        part: &InterpolationPart,
        env: &Environment,
        evaluator: &dyn ExpressionEvaluator,
    ) -> MlldResult<Value> {
        match part {
            InterpolationPart::Text(text) => Ok(Value::text(text.clone())),
            InterpolationPart::VariableRef(var_ref) => {
                let resolved = async {
                    let base = env.get(&var_ref.name).await?.value;
                    fields::resolve_field_chain(base, &var_ref.fields, env, evaluator).await
                }
                .await;

                match resolved {
                    Ok(value) => Ok(value),
                    Err(err) if !self.strict && is_missing_reference(&err) => {
                        tracing::warn!(variable = %var_ref.name, error = %err, "missing reference recovered to empty string (non-strict mode)");
                        Ok(Value::text(""))
                    }
                    Err(err) => Err(err),
                }
            }
            InterpolationPart::FileRef(file_ref) => {
                let path_value = Box::pin(self.render(&file_ref.path, env, evaluator)).await?;
                let path = path_value.render();
                file_refs::load_file_reference(self.loader, &path, file_ref.section.as_deref()).await
            }
            InterpolationPart::Expression(node) => evaluator.eval_node(node, env).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::VariableReferenceNode;
    use crate::value::Variable;

    struct NoExprEval;

    #[async_trait]
    impl ExpressionEvaluator for NoExprEval {
        async fn eval_node(&self, _node: &Node, _env: &Environment) -> MlldResult<Value> {
            unreachable!("no Expression parts in these tests")
        }
    }

    #[tokio::test]
    async fn renders_plain_text_unchanged() {
        let env = Environment::root();
        let loader = NullFileLoader;
        let engine = InterpolationEngine::new(&loader, EscapingStrategy::None);
        let parts = vec![InterpolationPart::Text("hello".into())];
        let result = engine.render(&parts, &env, &NoExprEval).await.unwrap();
        assert_eq!(result.as_text(), Some("hello"));
    }

    #[tokio::test]
    async fn variable_ref_merges_security_labels() {
        let env = Environment::root();
        let tainted = Value::with_security(
            ValueData::Text("secret-value".into()),
            SecurityDescriptor::new().with_label("secret"),
        );
        env.define(Variable::simple("token", tainted)).await;

        let loader = NullFileLoader;
        let engine = InterpolationEngine::new(&loader, EscapingStrategy::None);
        let parts = vec![
            InterpolationPart::Text("token=".into()),
            InterpolationPart::VariableRef(VariableReferenceNode { name: "token".into(), fields: vec![] }),
        ];
        let result = engine.render(&parts, &env, &NoExprEval).await.unwrap();
        assert_eq!(result.as_text(), Some("token=secret-value"));
        assert!(result.security.has_label("secret"));
    }

    #[tokio::test]
    async fn shell_strategy_escapes_interpolated_value() {
        let env = Environment::root();
        env.define(Variable::simple("name", Value::text("it's here"))).await;

        let loader = NullFileLoader;
        let engine = InterpolationEngine::new(&loader, EscapingStrategy::Shell);
        let parts = vec![InterpolationPart::VariableRef(VariableReferenceNode {
            name: "name".into(),
            fields: vec![],
        })];
        let result = engine.render(&parts, &env, &NoExprEval).await.unwrap();
        assert_eq!(result.as_text(), Some("'it'\\''s here'"));
    }
}
