//! Hook registration and before/after dispatch (spec §4.8, component
//! C8). Hook body errors never abort evaluation — they're isolated and
//! recorded onto `@mx.hooks.errors`, mirroring how guard/hook failures
//! are meant to degrade gracefully rather than crash the document.

use async_trait::async_trait;

use crate::ast::HookMatcher;
use crate::context::ContextManager;
use crate::env::Environment;
use crate::errors::{MlldError, MlldResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookTiming {
    Before,
    After,
}

#[derive(Debug, Clone)]
pub struct HookEntry {
    pub name: String,
    pub timing: HookTiming,
    pub matcher: HookMatcher,
}

fn matcher_key(matcher: &HookMatcher) -> String {
    match matcher {
        HookMatcher::Operation(op) => format!("op:{op}"),
        HookMatcher::Function { name, arg_prefix } => {
            format!("fn:{name}:{}", arg_prefix.as_deref().unwrap_or(""))
        }
        HookMatcher::Label(label) => format!("label:{label}"),
    }
}

/// Invokes a registered hook's body. Implemented by the evaluator.
#[async_trait]
pub trait HookInvoker: Send + Sync {
    async fn invoke_hook(&self, name: &str, env: &Environment) -> MlldResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    entries: Vec<HookEntry>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects a second registration of the same name within a
    /// timing+scope group (spec §4.8 `HOOK_DUPLICATE`); differently-named
    /// hooks are free to share a (timing, matcher) — they run in
    /// declaration order within that group.
    pub fn register(&mut self, entry: HookEntry) -> MlldResult<()> {
        let key = matcher_key(&entry.matcher);
        let timing = entry.timing;
        if self
            .entries
            .iter()
            .any(|e| e.timing == timing && matcher_key(&e.matcher) == key && e.name == entry.name)
        {
            return Err(MlldError::HookDuplicate {
                name: entry.name,
                timing: format!("{timing:?}"),
                scope: key,
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    fn matches(
        matcher: &HookMatcher,
        operation: &str,
        function: Option<&str>,
        label: Option<&str>,
        first_arg: Option<&str>,
    ) -> bool {
        match matcher {
            HookMatcher::Operation(op) => op == operation,
            HookMatcher::Function { name, arg_prefix } => {
                function == Some(name.as_str())
                    && arg_prefix
                        .as_deref()
                        .map_or(true, |prefix| first_arg.map_or(false, |arg| arg.starts_with(prefix)))
            }
            HookMatcher::Label(want) => label == Some(want.as_str()),
        }
    }

    /// Runs every hook matching `timing`/`operation`/`function`/`label`.
    /// `first_arg` is the rendered text of the callable's first
    /// positional argument, used only for `before @f("prefix")`-style arg
    /// matching. Each hook's failure is isolated: it's recorded on `ctx`
    /// and evaluation continues with the remaining hooks.
    #[allow(clippy::too_many_arguments)]
    pub async fn dispatch(
        &self,
        timing: HookTiming,
        operation: &str,
        function: Option<&str>,
        label: Option<&str>,
        first_arg: Option<&str>,
        env: &Environment,
        ctx: &mut ContextManager,
        invoker: &dyn HookInvoker,
    ) {
        for entry in self.entries.iter().filter(|e| e.timing == timing) {
            if !Self::matches(&entry.matcher, operation, function, label, first_arg) {
                continue;
            }
            if let Err(err) = invoker.invoke_hook(&entry.name, env).await {
                ctx.record_hook_error(format!("{}: {}", entry.name, err));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn duplicate_name_at_same_timing_and_matcher_rejected() {
        let mut reg = HookRegistry::new();
        reg.register(HookEntry {
            name: "a".into(),
            timing: HookTiming::Before,
            matcher: HookMatcher::Operation("run".into()),
        })
        .unwrap();

        let err = reg
            .register(HookEntry {
                name: "a".into(),
                timing: HookTiming::Before,
                matcher: HookMatcher::Operation("run".into()),
            })
            .unwrap_err();
        assert_eq!(err.code(), "HOOK_DUPLICATE");
    }

    #[test]
    fn differently_named_hooks_coexist_on_the_same_timing_and_matcher() {
        let mut reg = HookRegistry::new();
        reg.register(HookEntry {
            name: "a".into(),
            timing: HookTiming::Before,
            matcher: HookMatcher::Operation("run".into()),
        })
        .unwrap();
        reg.register(HookEntry {
            name: "b".into(),
            timing: HookTiming::Before,
            matcher: HookMatcher::Operation("run".into()),
        })
        .unwrap();
    }

    #[test]
    fn same_matcher_different_timing_is_allowed() {
        let mut reg = HookRegistry::new();
        reg.register(HookEntry {
            name: "a".into(),
            timing: HookTiming::Before,
            matcher: HookMatcher::Operation("run".into()),
        })
        .unwrap();
        reg.register(HookEntry {
            name: "b".into(),
            timing: HookTiming::After,
            matcher: HookMatcher::Operation("run".into()),
        })
        .unwrap();
    }

    struct FailingInvoker;
    #[async_trait]
    impl HookInvoker for FailingInvoker {
        async fn invoke_hook(&self, _name: &str, _env: &Environment) -> MlldResult<()> {
            Err(MlldError::InvalidDirective { message: "boom".into(), location: None })
        }
    }

    #[tokio::test]
    async fn failing_hook_is_isolated_into_hook_errors() {
        let mut reg = HookRegistry::new();
        reg.register(HookEntry {
            name: "audit".into(),
            timing: HookTiming::Before,
            matcher: HookMatcher::Operation("run".into()),
        })
        .unwrap();

        let env = Environment::root();
        let mut ctx = ContextManager::new();
        reg.dispatch(HookTiming::Before, "run", None, None, None, &env, &mut ctx, &FailingInvoker).await;

        let view = ctx.mx_view();
        let errors = view.get_field("hooks").unwrap().get_field("errors").unwrap();
        assert_eq!(errors.get_index(0).unwrap().as_text().map(|s| s.contains("boom")), Some(true));
    }

    #[allow(dead_code)]
    fn use_value(_v: Value) {}
}
