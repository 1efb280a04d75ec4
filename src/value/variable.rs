//! Named bindings stored in an [`crate::env::Environment`] (spec §3.1).

use super::structured::Value;

/// What kind of directive produced this binding — drives evaluator
/// dispatch for things like re-invocation (`Exe`) vs plain substitution
/// (`Simple`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariableKind {
    Simple,
    Exe,
    Path,
    Tools,
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub value: Value,
    pub kind: VariableKind,
    /// `true` once bound by `/var ... tools`; gates which directives may
    /// read it (spec §4.5.1).
    pub is_tools_collection: bool,
}

impl Variable {
    pub fn simple(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value, kind: VariableKind::Simple, is_tools_collection: false }
    }

    pub fn exe(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value, kind: VariableKind::Exe, is_tools_collection: false }
    }

    pub fn path(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value, kind: VariableKind::Path, is_tools_collection: false }
    }

    pub fn tools(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value, kind: VariableKind::Tools, is_tools_collection: true }
    }
}
