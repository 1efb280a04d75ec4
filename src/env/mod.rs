//! Lexical environment: scoping, intents, state writes, shadow
//! environments (spec component C2).

pub mod environment;
pub mod exe_def;
pub mod intents;
pub mod shadow;
pub mod state_writes;

pub use environment::Environment;
pub use exe_def::ExeDef;
pub use intents::{Intent, IntentStream};
pub use shadow::{ShadowEnvironment, ShadowEnvironments, ShadowLanguage};
pub use state_writes::{StateWrite, StateWriteBuffer, StateWriteTarget};
