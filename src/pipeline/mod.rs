//! Pipeline engine: stage chaining with retry/continue/done signals
//! (spec §4.7, component C7).

pub mod signals;
pub mod stage;

pub use signals::{
    decode_signal, encode_signal, ContinueSignal, ControlSignal, DoneSignal, PipelineSignal, RetrySignal,
    StageOutcome,
};
pub use stage::{PipelineEngine, StageInvoker};
