//! Shadow environments captured by `/exe` for language-specific reuse
//! (spec §4.5 `/exe`, §4.6.1 bash variable helpers).
//!
//! When an `/exe` body captures its defining scope for later invocation
//! in a particular language, we snapshot just the bindings that language
//! needs rather than cloning the whole environment graph.

use indexmap::IndexMap;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowLanguage {
    Sh,
    Js,
    Python,
}

impl ShadowLanguage {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sh" | "bash" => Some(Self::Sh),
            "js" | "javascript" | "node" => Some(Self::Js),
            "python" | "py" => Some(Self::Python),
            _ => None,
        }
    }
}

/// A frozen snapshot of variables visible to one language's exec form.
#[derive(Debug, Clone, Default)]
pub struct ShadowEnvironment {
    pub bindings: IndexMap<String, Value>,
}

impl ShadowEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ShadowEnvironments {
    pub sh: Option<ShadowEnvironment>,
    pub js: Option<ShadowEnvironment>,
    pub python: Option<ShadowEnvironment>,
}

impl ShadowEnvironments {
    pub fn get(&self, lang: ShadowLanguage) -> Option<&ShadowEnvironment> {
        match lang {
            ShadowLanguage::Sh => self.sh.as_ref(),
            ShadowLanguage::Js => self.js.as_ref(),
            ShadowLanguage::Python => self.python.as_ref(),
        }
    }

    pub fn set(&mut self, lang: ShadowLanguage, env: ShadowEnvironment) {
        match lang {
            ShadowLanguage::Sh => self.sh = Some(env),
            ShadowLanguage::Js => self.js = Some(env),
            ShadowLanguage::Python => self.python = Some(env),
        }
    }
}
