//! Guards: hooks whose body resolves to an allow/deny/retry/transform
//! decision instead of a side effect (spec §4.8).

use async_trait::async_trait;

use crate::ast::{HookMatcher, WhenNode};
use crate::context::{ContextManager, GuardRetryFrame};
use crate::env::Environment;
use crate::errors::{MlldError, MlldResult};
use crate::value::Value;

use super::registry::HookTiming;

#[derive(Debug, Clone)]
pub enum GuardDecision {
    Allow,
    Deny { reason: String },
    Retry { hint: Option<Value> },
    Transform { value: Value },
}

#[derive(Debug, Clone)]
pub struct GuardEntry {
    pub name: String,
    pub timing: HookTiming,
    pub matcher: HookMatcher,
    pub when: WhenNode,
}

/// Evaluates a guard's `when` body down to a decision. Implemented by
/// the evaluator.
#[async_trait]
pub trait GuardInvoker: Send + Sync {
    async fn invoke_guard(&self, guard: &GuardEntry, env: &Environment) -> MlldResult<GuardDecision>;
}

#[derive(Debug, Clone, Default)]
pub struct GuardRegistry {
    entries: Vec<GuardEntry>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entry: GuardEntry) -> MlldResult<()> {
        if self.entries.iter().any(|e| e.name == entry.name && e.timing == entry.timing) {
            return Err(MlldError::HookDuplicate {
                name: entry.name,
                timing: format!("{:?}", entry.timing),
                scope: "guard".to_string(),
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn has_after_guard(&self, operation: &str) -> bool {
        self.entries.iter().any(|e| {
            e.timing == HookTiming::After
                && matches!(&e.matcher, HookMatcher::Operation(op) if op == operation)
        })
    }

    /// Runs every matching guard in registration order; the first
    /// non-`Allow` decision wins and short-circuits the rest (spec §4.8:
    /// a deny or retry from one guard should not be overridden by a
    /// later guard silently allowing).
    ///
    /// `label` is the dispatching operation's own label, if it carries
    /// one. A registered `before <label>` / `after <label>` guard (spec
    /// §4.6 "Data labels") only fires on operations whose effective
    /// labels contain it; an unlabeled operation simply doesn't match.
    pub async fn evaluate(
        &self,
        timing: HookTiming,
        operation: &str,
        label: Option<&str>,
        env: &Environment,
        ctx: &mut ContextManager,
        invoker: &dyn GuardInvoker,
    ) -> MlldResult<GuardDecision> {
        for entry in self.entries.iter().filter(|e| e.timing == timing) {
            let matches = match &entry.matcher {
                HookMatcher::Operation(op) => op == operation,
                // Guards are only dispatched by operation kind (spec §4.8);
                // `before @f(...)`-style function matchers apply to audit
                // hooks, not policy guards.
                HookMatcher::Function { .. } => false,
                HookMatcher::Label(want) => label == Some(want.as_str()),
            };
            if !matches {
                continue;
            }

            ctx.push_guard_retry(GuardRetryFrame {
                guard_name: entry.name.clone(),
                denied: false,
                deny_reason: None,
            });
            let decision = invoker.invoke_guard(entry, env).await;
            ctx.pop_guard_retry();

            match decision? {
                GuardDecision::Allow => continue,
                other => return Ok(other),
            }
        }
        Ok(GuardDecision::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::WhenNode;

    fn entry(name: &str, timing: HookTiming) -> GuardEntry {
        GuardEntry {
            name: name.to_string(),
            timing,
            matcher: HookMatcher::Operation("run".into()),
            when: WhenNode { first_only: false, patterns: vec![] },
        }
    }

    struct AlwaysDeny;
    #[async_trait]
    impl GuardInvoker for AlwaysDeny {
        async fn invoke_guard(&self, _guard: &GuardEntry, _env: &Environment) -> MlldResult<GuardDecision> {
            Ok(GuardDecision::Deny { reason: "policy".into() })
        }
    }

    #[tokio::test]
    async fn deny_short_circuits_remaining_guards() {
        let mut reg = GuardRegistry::new();
        reg.register(entry("first", HookTiming::Before)).unwrap();
        reg.register(entry("second", HookTiming::Before)).unwrap();

        let env = Environment::root();
        let mut ctx = ContextManager::new();
        let decision = reg.evaluate(HookTiming::Before, "run", None, &env, &mut ctx, &AlwaysDeny).await.unwrap();
        match decision {
            GuardDecision::Deny { reason } => assert_eq!(reason, "policy"),
            _ => panic!("expected deny"),
        }
        assert!(ctx.is_balanced());
    }

    #[test]
    fn has_after_guard_detects_registered_operation() {
        let mut reg = GuardRegistry::new();
        reg.register(entry("g", HookTiming::After)).unwrap();
        assert!(reg.has_after_guard("run"));
        assert!(!reg.has_after_guard("show"));
    }

    struct AlwaysAllow;
    #[async_trait]
    impl GuardInvoker for AlwaysAllow {
        async fn invoke_guard(&self, _guard: &GuardEntry, _env: &Environment) -> MlldResult<GuardDecision> {
            Ok(GuardDecision::Allow)
        }
    }

    #[tokio::test]
    async fn label_guard_matches_operations_carrying_that_label() {
        let mut reg = GuardRegistry::new();
        reg.register(GuardEntry {
            name: "pii-guard".into(),
            timing: HookTiming::Before,
            matcher: HookMatcher::Label("pii".into()),
            when: WhenNode { first_only: false, patterns: vec![] },
        })
        .unwrap();

        let env = Environment::root();
        let mut ctx = ContextManager::new();
        let decision = reg
            .evaluate(HookTiming::Before, "var", Some("pii"), &env, &mut ctx, &AlwaysAllow)
            .await
            .unwrap();
        assert!(matches!(decision, GuardDecision::Allow));
    }

    #[tokio::test]
    async fn label_guard_does_not_fire_on_an_unlabeled_operation() {
        let mut reg = GuardRegistry::new();
        reg.register(GuardEntry {
            name: "pii-guard".into(),
            timing: HookTiming::Before,
            matcher: HookMatcher::Label("pii".into()),
            when: WhenNode { first_only: false, patterns: vec![] },
        })
        .unwrap();

        let env = Environment::root();
        let mut ctx = ContextManager::new();
        let decision = reg
            .evaluate(HookTiming::Before, "var", None, &env, &mut ctx, &AlwaysAllow)
            .await
            .unwrap();
        assert!(matches!(decision, GuardDecision::Allow));
    }
}
