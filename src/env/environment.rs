//! Lexical [`Environment`]: parent-chained variable scope plus the
//! per-document intent stream and state-write buffer (spec §3/§4.2,
//! component C2). Modeled on `just-bash::interpreter::types`'s composed
//! state struct, generalized from a single global shell scope to a tree
//! of nested scopes (`/exe` bodies, `/for` bodies, imported modules each
//! get a child).

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::exe_def::ExeDef;
use super::intents::IntentStream;
use super::shadow::ShadowEnvironments;
use super::state_writes::StateWriteBuffer;
use crate::errors::{MlldError, MlldResult};
use crate::value::Variable;

struct EnvironmentData {
    parent: Option<Environment>,
    bindings: indexmap::IndexMap<String, Variable>,
    exe_defs: indexmap::IndexMap<String, ExeDef>,
    shadow: ShadowEnvironments,
    intents: IntentStream,
    state_writes: StateWriteBuffer,
    /// References currently being resolved by `/import`, document-global
    /// like `intents`/`state_writes` (spec §4.9 cycle/depth tracking).
    /// Entries are added before resolving and removed once that
    /// resolution finishes, so it reflects the active import call stack
    /// rather than every reference ever imported.
    import_chain: HashSet<String>,
}

/// Cheap to clone — wraps an `Arc<Mutex<_>>`, so every clone refers to
/// the same underlying scope.
#[derive(Clone)]
pub struct Environment {
    inner: Arc<Mutex<EnvironmentData>>,
}

impl Environment {
    pub fn root() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EnvironmentData {
                parent: None,
                bindings: indexmap::IndexMap::new(),
                exe_defs: indexmap::IndexMap::new(),
                shadow: ShadowEnvironments::default(),
                intents: IntentStream::new(),
                state_writes: StateWriteBuffer::new(),
                import_chain: HashSet::new(),
            })),
        }
    }

    /// A new scope whose lookups fall through to `self` on miss.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EnvironmentData {
                parent: Some(self.clone()),
                bindings: indexmap::IndexMap::new(),
                exe_defs: indexmap::IndexMap::new(),
                shadow: ShadowEnvironments::default(),
                intents: IntentStream::new(),
                state_writes: StateWriteBuffer::new(),
                import_chain: HashSet::new(),
            })),
        }
    }

    pub async fn define(&self, var: Variable) {
        self.inner.lock().await.bindings.insert(var.name.clone(), var);
    }

    /// Walks the parent chain; the first scope that defines `name` wins.
    pub async fn get(&self, name: &str) -> MlldResult<Variable> {
        let data = self.inner.lock().await;
        if let Some(var) = data.bindings.get(name) {
            return Ok(var.clone());
        }
        match &data.parent {
            Some(parent) => {
                let parent = parent.clone();
                drop(data);
                Box::pin(parent.get(name)).await
            }
            None => Err(MlldError::VariableNotFound { name: name.to_string(), location: None }),
        }
    }

    pub async fn has(&self, name: &str) -> bool {
        self.get(name).await.is_ok()
    }

    /// Rebinds `name` in the scope that owns it (for `+=`); defines it
    /// locally if no ancestor owns it yet.
    pub async fn set(&self, var: Variable) -> MlldResult<()> {
        if self.owner_has(&var.name).await {
            self.assign_in_owner(var).await
        } else {
            self.define(var).await;
            Ok(())
        }
    }

    async fn owner_has(&self, name: &str) -> bool {
        let data = self.inner.lock().await;
        if data.bindings.contains_key(name) {
            return true;
        }
        match &data.parent {
            Some(parent) => {
                let parent = parent.clone();
                drop(data);
                Box::pin(parent.owner_has(name)).await
            }
            None => false,
        }
    }

    async fn assign_in_owner(&self, var: Variable) -> MlldResult<()> {
        let mut data = self.inner.lock().await;
        if data.bindings.contains_key(&var.name) {
            data.bindings.insert(var.name.clone(), var);
            return Ok(());
        }
        match &data.parent {
            Some(parent) => {
                let parent = parent.clone();
                drop(data);
                Box::pin(parent.assign_in_owner(var)).await
            }
            None => Err(MlldError::VariableNotFound { name: var.name, location: None }),
        }
    }

    pub async fn define_exe(&self, name: impl Into<String>, def: ExeDef) {
        self.inner.lock().await.exe_defs.insert(name.into(), def);
    }

    pub async fn get_exe(&self, name: &str) -> MlldResult<ExeDef> {
        let data = self.inner.lock().await;
        if let Some(def) = data.exe_defs.get(name) {
            return Ok(def.clone());
        }
        match &data.parent {
            Some(parent) => {
                let parent = parent.clone();
                drop(data);
                Box::pin(parent.get_exe(name)).await
            }
            None => Err(MlldError::VariableNotFound { name: name.to_string(), location: None }),
        }
    }

    pub async fn set_shadow(&self, lang: super::shadow::ShadowLanguage, env: super::shadow::ShadowEnvironment) {
        self.inner.lock().await.shadow.set(lang, env);
    }

    pub async fn shadow(&self, lang: super::shadow::ShadowLanguage) -> Option<super::shadow::ShadowEnvironment> {
        self.inner.lock().await.shadow.get(lang).cloned()
    }

    /// Walks to the outermost ancestor: intents and state-writes are
    /// document-global (spec §3/§4.2, §6), not per-scope, even though
    /// bindings are — a `/for`/`/exe`/hook body's `env.child()` must still
    /// land its `/show`/`/output` effects where `eval_document` looks for
    /// them.
    fn doc_root(&self) -> Pin<Box<dyn Future<Output = Environment> + Send + '_>> {
        Box::pin(async move {
            let data = self.inner.lock().await;
            match &data.parent {
                Some(parent) => {
                    let parent = parent.clone();
                    drop(data);
                    parent.doc_root().await
                }
                None => self.clone(),
            }
        })
    }

    pub async fn push_intent(&self, intent: super::intents::Intent) {
        self.doc_root().await.inner.lock().await.intents.push(intent);
    }

    pub async fn take_intents(&self) -> IntentStream {
        let root = self.doc_root().await;
        let taken = std::mem::take(&mut root.inner.lock().await.intents);
        taken
    }

    pub async fn push_state_write(&self, write: super::state_writes::StateWrite) {
        self.doc_root().await.inner.lock().await.state_writes.push(write);
    }

    pub async fn drain_state_writes(&self) -> Vec<super::state_writes::StateWrite> {
        self.doc_root().await.inner.lock().await.state_writes.drain()
    }

    /// Enters `reference` on the document-global import call stack (spec
    /// §4.9): fails with `IMPORT_CYCLE` if it's already mid-resolution
    /// (a genuine revisit, not just "imported before"), or
    /// `IMPORT_DEPTH_EXCEEDED` once the stack is already `max_depth`
    /// deep. Returns the depth this import is entering at. Pair with
    /// [`Environment::end_import`] once resolution finishes.
    pub async fn begin_import(&self, reference: &str, max_depth: u32) -> MlldResult<u32> {
        let root = self.doc_root().await;
        let mut data = root.inner.lock().await;
        if data.import_chain.contains(reference) {
            return Err(MlldError::ImportCycle { path: reference.to_string() });
        }
        let depth = data.import_chain.len() as u32;
        if depth >= max_depth {
            return Err(MlldError::ImportDepthExceeded { depth: depth + 1, max: max_depth });
        }
        data.import_chain.insert(reference.to_string());
        Ok(depth)
    }

    pub async fn end_import(&self, reference: &str) {
        self.doc_root().await.inner.lock().await.import_chain.remove(reference);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[tokio::test]
    async fn child_scope_falls_through_to_parent() {
        let root = Environment::root();
        root.define(Variable::simple("x", Value::text("root"))).await;

        let child = root.child();
        let found = child.get("x").await.unwrap();
        assert_eq!(found.value.as_text(), Some("root"));
    }

    #[tokio::test]
    async fn child_shadowing_does_not_mutate_parent() {
        let root = Environment::root();
        root.define(Variable::simple("x", Value::text("root"))).await;

        let child = root.child();
        child.define(Variable::simple("x", Value::text("child"))).await;

        assert_eq!(child.get("x").await.unwrap().value.as_text(), Some("child"));
        assert_eq!(root.get("x").await.unwrap().value.as_text(), Some("root"));
    }

    #[tokio::test]
    async fn set_on_child_rebinds_parent_owned_variable() {
        let root = Environment::root();
        root.define(Variable::simple("count", Value::new(crate::value::ValueData::Number(1.0)))).await;

        let child = root.child();
        child.set(Variable::simple("count", Value::new(crate::value::ValueData::Number(2.0)))).await.unwrap();

        let via_root = root.get("count").await.unwrap();
        assert_eq!(via_root.value.as_bool(), None);
    }

    #[tokio::test]
    async fn missing_variable_is_an_error() {
        let root = Environment::root();
        let err = root.get("nope").await.unwrap_err();
        assert_eq!(err.code(), "VARIABLE_NOT_FOUND");
    }

    #[tokio::test]
    async fn intents_pushed_from_a_nested_scope_surface_at_the_root() {
        let root = Environment::root();
        let grandchild = root.child().child();

        grandchild.push_intent(crate::env::Intent::Content("from nested scope".to_string())).await;

        let entries = root.take_intents().await.into_entries();
        assert_eq!(entries.len(), 1);
        match &entries[0] {
            crate::env::Intent::Content(text) => assert_eq!(text, "from nested scope"),
            other => panic!("unexpected intent: {other:?}"),
        }
    }

    #[tokio::test]
    async fn state_writes_from_a_nested_scope_drain_at_the_root() {
        let root = Environment::root();
        let child = root.child();

        child
            .push_state_write(super::super::state_writes::StateWrite {
                key: "k".to_string(),
                value: Value::text("v"),
                append: false,
                target: super::super::state_writes::StateWriteTarget::State,
            })
            .await;

        let drained = root.drain_state_writes().await;
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].key, "k");
    }
}
