//! Exec/command execution abstraction (spec §4.6, component C6).
//!
//! Running a process is a host concern — same split as `just-bash`'s
//! `CommandExecutor` trait — so this module only defines the request/
//! result shapes and the bash variable/NDJSON helpers layered on top.

pub mod bash_vars;
pub mod streaming;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::errors::MlldResult;
use crate::value::CommandResultValue;

pub use bash_vars::{bash_helper_env, bash_helper_vars};
pub use streaming::{NdjsonBuffer, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecLanguage {
    Sh,
    Js,
    Python,
}

#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub language: ExecLanguage,
    pub source: String,
    pub env_vars: IndexMap<String, String>,
    pub cwd: Option<String>,
    pub timeout: Option<std::time::Duration>,
}

/// Runs one exec invocation to completion. Implemented by the host
/// (process spawning is out of scope for this crate's own tests, which
/// exercise the trait through fakes).
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, request: ExecRequest) -> MlldResult<CommandResultValue>;
}
