//! Crate-wide error type.
//!
//! Every stable error code from the interpreter design (parse/validation,
//! resolution, path/IO, execution, pipeline, imports, hooks/guards, security,
//! transport) is a variant here. Mirrors the shape of a control-flow error
//! family: one struct-ish variant per kind, a `code()` accessor returning the
//! stable wire identifier, and a `Location` carried optionally for diagnostics.

use std::fmt;

use thiserror::Error;

/// Source location of a node, mirrors the `{start,end,filePath?}` shape
/// AST nodes carry (see `ast::types::Location`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub line: u32,
    pub column: u32,
    pub file_path: Option<String>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file_path {
            Some(path) => write!(f, "{}:{}:{}", path, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// Unified interpreter error. `code()` returns the stable identifier used
/// in diagnostics and tests; `location`/`cause` are optional context.
#[derive(Error, Debug, Clone)]
pub enum MlldError {
    #[error("parse error: {message}")]
    ParseError { message: String, location: Option<Location> },

    #[error("validation failed: {message}")]
    ValidationFailed { message: String, location: Option<Location> },

    #[error("invalid directive: {message}")]
    InvalidDirective { message: String, location: Option<Location> },

    #[error("variable not found: @{name}")]
    VariableNotFound { name: String, location: Option<Location> },

    #[error("field not found: {field}")]
    FieldNotFound { field: String, location: Option<Location> },

    #[error("field index out of bounds: {index} (len {len})")]
    FieldOutOfBounds { index: i64, len: usize, location: Option<Location> },

    #[error("circular reference detected: {path}")]
    CircularReference { path: String },

    #[error("invalid node type: expected {expected}, got {actual}")]
    InvalidNodeType { expected: String, actual: String },

    #[error("invalid path: {message}")]
    PathInvalid { message: String, location: Option<Location> },

    #[error("path must be absolute: {path}")]
    PathNotAbsolute { path: String },

    #[error("path root denied: {path}")]
    PathRootDenied { path: String },

    #[error("file not found: {path}")]
    FileNotFound { path: String },

    #[error("permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("command exited non-zero ({exit_code}): {stderr}")]
    ExecNonZero { exit_code: i32, stderr: String },

    #[error("command timed out after {0:?}")]
    ExecTimeout(std::time::Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("pipeline retry exhausted after {attempts} attempts at stage {stage} ({function})")]
    PipelineRetryExhausted { stage: usize, function: String, attempts: u32 },

    #[error("retry denied at stage {stage} ({function})")]
    RetryDenied { stage: usize, function: String },

    #[error("cannot stream: an after-guard is registered on this callable")]
    StreamAfterGuardConflict,

    #[error("import cycle detected: {path}")]
    ImportCycle { path: String },

    #[error("import collision: @{name} already bound in this scope")]
    ImportCollision { name: String },

    #[error("import depth exceeded ({depth} > {max})")]
    ImportDepthExceeded { depth: u32, max: u32 },

    #[error("module not found: {reference}")]
    ModuleNotFound { reference: String },

    #[error("duplicate hook registration: {name} ({timing:?} {scope})")]
    HookDuplicate { name: String, timing: String, scope: String },

    #[error("guard denied: {message}")]
    GuardDeny { message: String },

    #[error("security policy denied: {message}")]
    SecurityPolicyDeny { message: String },

    #[error("transport error: {message}")]
    TransportError { message: String },

    #[error("request timed out")]
    Timeout,

    #[error("request not found: {id}")]
    RequestNotFound { id: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("tool collection validation failed: {message}")]
    ToolCollectionInvalid { message: String },

    #[error("required tool `{name}` missing from collection")]
    ExposeMissingRequired { name: String },

    #[error("assignment mismatch: cannot += a {rhs_type} onto a {lhs_type}")]
    AssignMismatch { lhs_type: String, rhs_type: String },

    #[error("context stack imbalance: {message}")]
    ContextImbalance { message: String },

    #[error("security label required: {label}")]
    SecurityLabelRequired { label: String },

    #[error("invalid value type: expected one of {expected:?}, got {actual}")]
    InvalidValueType { expected: Vec<String>, actual: String },
}

impl MlldError {
    /// Stable wire identifier, as enumerated in the interpreter error design.
    pub fn code(&self) -> &'static str {
        match self {
            MlldError::ParseError { .. } => "PARSE_ERROR",
            MlldError::ValidationFailed { .. } => "VALIDATION_FAILED",
            MlldError::InvalidDirective { .. } => "INVALID_DIRECTIVE",
            MlldError::VariableNotFound { .. } => "VARIABLE_NOT_FOUND",
            MlldError::FieldNotFound { .. } => "FIELD_NOT_FOUND",
            MlldError::FieldOutOfBounds { .. } => "FIELD_OUT_OF_BOUNDS",
            MlldError::CircularReference { .. } => "CIRCULAR_REFERENCE",
            MlldError::InvalidNodeType { .. } => "INVALID_NODE_TYPE",
            MlldError::PathInvalid { .. } => "PATH_INVALID",
            MlldError::PathNotAbsolute { .. } => "PATH_NOT_ABSOLUTE",
            MlldError::PathRootDenied { .. } => "PATH_ROOT_DENIED",
            MlldError::FileNotFound { .. } => "FILE_NOT_FOUND",
            MlldError::PermissionDenied { .. } => "PERMISSION_DENIED",
            MlldError::ExecNonZero { .. } => "EXEC_NONZERO",
            MlldError::ExecTimeout(_) => "EXEC_TIMEOUT",
            MlldError::Cancelled => "CANCELLED",
            MlldError::PipelineRetryExhausted { .. } => "PIPELINE_RETRY_EXHAUSTED",
            MlldError::RetryDenied { .. } => "RETRY_DENIED",
            MlldError::StreamAfterGuardConflict => "STREAM_AFTER_GUARD_CONFLICT",
            MlldError::ImportCycle { .. } => "IMPORT_CYCLE",
            MlldError::ImportCollision { .. } => "IMPORT_COLLISION",
            MlldError::ImportDepthExceeded { .. } => "IMPORT_DEPTH_EXCEEDED",
            MlldError::ModuleNotFound { .. } => "MODULE_NOT_FOUND",
            MlldError::HookDuplicate { .. } => "HOOK_DUPLICATE",
            MlldError::GuardDeny { .. } => "GUARD_DENY",
            MlldError::SecurityPolicyDeny { .. } => "SECURITY_POLICY_DENY",
            MlldError::TransportError { .. } => "TRANSPORT_ERROR",
            MlldError::Timeout => "TIMEOUT",
            MlldError::RequestNotFound { .. } => "REQUEST_NOT_FOUND",
            MlldError::InvalidRequest { .. } => "INVALID_REQUEST",
            MlldError::ToolCollectionInvalid { .. } => "TOOL_COLLECTION_INVALID",
            MlldError::ExposeMissingRequired { .. } => "EXPOSE_MISSING_REQUIRED",
            MlldError::AssignMismatch { .. } => "ASSIGN_MISMATCH",
            MlldError::ContextImbalance { .. } => "CONTEXT_IMBALANCE",
            MlldError::SecurityLabelRequired { .. } => "SECURITY_LABEL_REQUIRED",
            MlldError::InvalidValueType { .. } => "INVALID_VALUE_TYPE",
        }
    }

    pub fn location(&self) -> Option<&Location> {
        match self {
            MlldError::ParseError { location, .. }
            | MlldError::ValidationFailed { location, .. }
            | MlldError::InvalidDirective { location, .. }
            | MlldError::VariableNotFound { location, .. }
            | MlldError::FieldNotFound { location, .. }
            | MlldError::FieldOutOfBounds { location, .. }
            | MlldError::PathInvalid { location, .. } => location.as_ref(),
            _ => None,
        }
    }
}

pub type MlldResult<T> = Result<T, MlldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_matches_stable_identifier() {
        let err = MlldError::VariableNotFound { name: "x".into(), location: None };
        assert_eq!(err.code(), "VARIABLE_NOT_FOUND");
    }

    #[test]
    fn location_display_with_file() {
        let loc = Location { line: 3, column: 5, file_path: Some("a.mld".into()) };
        assert_eq!(loc.to_string(), "a.mld:3:5");
    }

    #[test]
    fn location_display_without_file() {
        let loc = Location { line: 1, column: 1, file_path: None };
        assert_eq!(loc.to_string(), "1:1");
    }
}
