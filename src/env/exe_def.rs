//! Stored shape of an `/exe` definition (spec §4.5 `/exe`): captures its
//! defining scope so a later invocation resolves free variables the way
//! a closure would, the same lexical-capture shape `/for`/`/loop` bodies
//! rely on too.

use crate::ast::{ExeBody, ParamDef};

use super::environment::Environment;
use super::shadow::ShadowEnvironment;

#[derive(Clone)]
pub struct ExeDef {
    pub params: Vec<ParamDef>,
    pub body: ExeBody,
    pub labels: Vec<String>,
    pub retryable: bool,
    pub closure: Environment,
    /// Snapshot of sibling callables visible to the body's language at
    /// definition time (spec §4.2 `captureShadowEnvironment`), installed
    /// into the call-time child scope by `invoke_exe` (§4.5, §9).
    pub shadow: Option<ShadowEnvironment>,
}
