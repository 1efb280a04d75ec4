//! Runtime value model (spec §3.1 "Structured values").
//!
//! Mirrors `just-bash`'s own approach of a single tagged value enum
//! threaded through the interpreter rather than `dyn Any` — field access,
//! interpolation and command-result capture all match on [`Value`]
//! directly.

use indexmap::IndexMap;
use std::fmt;

use super::security::SecurityDescriptor;
use crate::errors::{MlldError, MlldResult};

/// A primitive-or-structured runtime value plus its security descriptor.
#[derive(Debug, Clone)]
pub struct Value {
    pub data: ValueData,
    pub security: SecurityDescriptor,
}

impl Value {
    pub fn new(data: ValueData) -> Self {
        Self { data, security: SecurityDescriptor::default() }
    }

    pub fn with_security(data: ValueData, security: SecurityDescriptor) -> Self {
        Self { data, security }
    }

    pub fn null() -> Self {
        Self::new(ValueData::Null)
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::new(ValueData::Text(s.into()))
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.data {
            ValueData::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.data {
            ValueData::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Truthiness for `/when` and `? :` conditions: empty string, `false`,
    /// `0`, `null`, and empty collections are falsy.
    pub fn is_truthy(&self) -> bool {
        match &self.data {
            ValueData::Null => false,
            ValueData::Bool(b) => *b,
            ValueData::Number(n) => *n != 0.0,
            ValueData::Text(s) => !s.is_empty(),
            ValueData::Array(items) => !items.is_empty(),
            ValueData::Object(fields) => !fields.is_empty(),
            ValueData::Path(_) => true,
            ValueData::CommandResult(r) => r.exit_code == 0,
            ValueData::ToolCollection(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.data {
            ValueData::Null => "null",
            ValueData::Bool(_) => "boolean",
            ValueData::Number(_) => "number",
            ValueData::Text(_) => "text",
            ValueData::Array(_) => "array",
            ValueData::Object(_) => "object",
            ValueData::Path(_) => "path",
            ValueData::CommandResult(_) => "command-result",
            ValueData::ToolCollection(_) => "tools",
        }
    }

    /// Field access used by `VariableReferenceWithTail` (spec §4.1).
    pub fn get_field(&self, field: &str) -> MlldResult<Value> {
        match &self.data {
            ValueData::Object(map) => map
                .get(field)
                .cloned()
                .ok_or_else(|| MlldError::FieldNotFound { field: field.to_string(), location: None }),
            ValueData::CommandResult(result) => match field {
                "stdout" => Ok(Value::with_security(ValueData::Text(result.stdout.clone()), self.security.clone())),
                "stderr" => Ok(Value::with_security(ValueData::Text(result.stderr.clone()), self.security.clone())),
                "exitCode" => Ok(Value::with_security(ValueData::Number(result.exit_code as f64), self.security.clone())),
                _ => Err(MlldError::FieldNotFound { field: field.to_string(), location: None }),
            },
            _ => Err(MlldError::InvalidNodeType {
                expected: "object".to_string(),
                actual: self.type_name().to_string(),
            }),
        }
    }

    pub fn get_index(&self, index: i64) -> MlldResult<Value> {
        match &self.data {
            ValueData::Array(items) => {
                let idx = if index < 0 { items.len() as i64 + index } else { index };
                items
                    .get(idx as usize)
                    .cloned()
                    .ok_or(MlldError::FieldOutOfBounds { index, len: items.len(), location: None })
            }
            _ => Err(MlldError::InvalidNodeType {
                expected: "array".to_string(),
                actual: self.type_name().to_string(),
            }),
        }
    }

    /// Concatenation used by string interpolation and `+=` on text/array
    /// values; security descriptors union per spec §3.1.
    pub fn concat(&self, other: &Value) -> MlldResult<Value> {
        let security = self.security.merge(&other.security);
        match (&self.data, &other.data) {
            (ValueData::Text(a), ValueData::Text(b)) => {
                Ok(Value::with_security(ValueData::Text(format!("{a}{b}")), security))
            }
            (ValueData::Array(a), ValueData::Array(b)) => {
                let mut items = a.clone();
                items.extend(b.clone());
                Ok(Value::with_security(ValueData::Array(items), security))
            }
            (ValueData::Object(a), ValueData::Object(b)) => {
                let mut fields = a.clone();
                for (key, value) in b.clone() {
                    fields.insert(key, value);
                }
                Ok(Value::with_security(ValueData::Object(fields), security))
            }
            _ => Err(MlldError::AssignMismatch {
                lhs_type: self.type_name().to_string(),
                rhs_type: other.type_name().to_string(),
            }),
        }
    }

    /// Rendering used by `/show`, template interpolation, and document
    /// reconstruction (spec §4.10).
    pub fn render(&self) -> String {
        match &self.data {
            ValueData::Null => String::new(),
            ValueData::Bool(b) => b.to_string(),
            ValueData::Number(n) => format_number(*n),
            ValueData::Text(s) => s.clone(),
            ValueData::Array(_) | ValueData::Object(_) => self.to_json().to_string(),
            ValueData::Path(p) => p.raw.clone(),
            ValueData::CommandResult(r) => r.stdout.clone(),
            ValueData::ToolCollection(t) => format!("[tools: {}]", t.names.join(", ")),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match &self.data {
            ValueData::Null => serde_json::Value::Null,
            ValueData::Bool(b) => serde_json::Value::Bool(*b),
            ValueData::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueData::Text(s) => serde_json::Value::String(s.clone()),
            ValueData::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            ValueData::Object(map) => {
                serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
            ValueData::Path(p) => serde_json::Value::String(p.raw.clone()),
            ValueData::CommandResult(r) => serde_json::json!({
                "stdout": r.stdout,
                "stderr": r.stderr,
                "exitCode": r.exit_code,
            }),
            ValueData::ToolCollection(t) => serde_json::Value::Array(
                t.names.iter().cloned().map(serde_json::Value::String).collect(),
            ),
        }
    }

    /// `.jsonl` append target rejects any value that can't round-trip
    /// through a single JSON line (spec §4.5 `/output`).
    pub fn is_jsonl_serializable(&self) -> bool {
        !matches!(self.data, ValueData::ToolCollection(_) | ValueData::CommandResult(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[derive(Debug, Clone)]
pub enum ValueData {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Path(PathValue),
    CommandResult(CommandResultValue),
    ToolCollection(ToolCollectionValue),
}

#[derive(Debug, Clone)]
pub struct PathValue {
    pub raw: String,
    pub absolute: bool,
}

#[derive(Debug, Clone)]
pub struct CommandResultValue {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ToolCollectionValue {
    pub names: Vec<String>,
    pub bindings: IndexMap<String, String>,
}
