//! `/path` (spec §4.5): binds a path-typed variable, optionally
//! requiring it resolve to an absolute path confined to an allowed root.

use crate::ast::Node;
use crate::context::ContextManager;
use crate::env::Environment;
use crate::errors::{MlldError, MlldResult};
use crate::value::{PathValue, Value, ValueData, Variable};

use super::Evaluator;

pub async fn eval_path(
    ev: &Evaluator,
    name: &str,
    expr: &Node,
    require_absolute: bool,
    env: &Environment,
    ctx: &mut ContextManager,
) -> MlldResult<()> {
    let value = ev.eval(expr, env, ctx).await?;
    let raw = value.render();

    if raw.is_empty() {
        return Err(MlldError::PathInvalid { message: "path is empty".to_string(), location: None });
    }

    let absolute = raw.starts_with('/') || raw.get(1..2) == Some(":");

    if require_absolute {
        if !absolute {
            return Err(MlldError::PathNotAbsolute { path: raw });
        }
        check_allowed_root(ev, &raw)?;
    }

    let path_value = Value::with_security(ValueData::Path(PathValue { raw, absolute }), value.security);
    env.set(Variable::path(name, path_value)).await
}

/// `security.allowedRoots` (spec §4.5, §6.2): an empty list means no
/// restriction. A non-empty list requires `raw` to sit under at least one
/// configured root, else `PATH_ROOT_DENIED`.
fn check_allowed_root(ev: &Evaluator, raw: &str) -> MlldResult<()> {
    if ev.allowed_roots.is_empty() {
        return Ok(());
    }
    let under_allowed_root = ev.allowed_roots.iter().any(|root| {
        let root = root.trim_end_matches('/');
        raw == root || raw.starts_with(&format!("{root}/"))
    });
    if under_allowed_root {
        Ok(())
    } else {
        Err(MlldError::PathRootDenied { path: raw.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Location, NodeKind};

    fn lit(s: &str) -> Node {
        Node::new(NodeKind::Literal(crate::ast::LiteralValue::String(s.to_string())), Location::default())
    }

    #[tokio::test]
    async fn empty_path_is_rejected_as_invalid() {
        let ev = super::super::tests::test_evaluator();
        let env = Environment::root();
        let mut ctx = ContextManager::new();
        let err = eval_path(&ev, "n", &lit(""), false, &env, &mut ctx).await.unwrap_err();
        assert_eq!(err.code(), "PATH_INVALID");
    }

    #[tokio::test]
    async fn relative_path_is_rejected_when_absolute_is_required() {
        let ev = super::super::tests::test_evaluator();
        let env = Environment::root();
        let mut ctx = ContextManager::new();
        let err = eval_path(&ev, "n", &lit("relative/dir"), true, &env, &mut ctx).await.unwrap_err();
        assert_eq!(err.code(), "PATH_NOT_ABSOLUTE");
    }

    #[tokio::test]
    async fn absolute_path_outside_every_allowed_root_is_denied() {
        let ev = super::super::tests::test_evaluator().with_allowed_roots(vec!["/home/project".to_string()]);
        let env = Environment::root();
        let mut ctx = ContextManager::new();
        let err = eval_path(&ev, "n", &lit("/etc/passwd"), true, &env, &mut ctx).await.unwrap_err();
        assert_eq!(err.code(), "PATH_ROOT_DENIED");
    }

    #[tokio::test]
    async fn absolute_path_under_an_allowed_root_is_bound() {
        let ev = super::super::tests::test_evaluator().with_allowed_roots(vec!["/home/project".to_string()]);
        let env = Environment::root();
        let mut ctx = ContextManager::new();
        eval_path(&ev, "n", &lit("/home/project/src/main.rs"), true, &env, &mut ctx).await.unwrap();
        let bound = env.get("n").await.unwrap();
        match &bound.value.data {
            ValueData::Path(p) => assert!(p.absolute),
            other => panic!("expected a path value, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn with_no_allowed_roots_configured_any_absolute_path_is_bound() {
        let ev = super::super::tests::test_evaluator();
        let env = Environment::root();
        let mut ctx = ContextManager::new();
        eval_path(&ev, "n", &lit("/tmp/anything"), true, &env, &mut ctx).await.unwrap();
    }
}
