//! AST node shapes consumed by the evaluator.
//!
//! The grammar that produces these nodes is a collaborator out of scope for
//! this crate (spec §1) — this module only defines the shapes the evaluator
//! walks, mirroring how `just-bash`'s own `ast::types` module is a pure data
//! definition with no parsing logic of its own.

pub mod types;

pub use types::*;
