//! Pipeline control-flow signals (spec §9: "retry/continue/done are
//! signals, not exceptions"). Modeled directly on `just-bash`'s
//! `ControlFlowError` family: one small struct per signal kind, unified
//! by an enum with `From` impls so stage execution can `?`-propagate a
//! signal the same way it propagates a real error, while the pipeline
//! loop distinguishes the two by type rather than by string matching.

use crate::value::{Value, ValueData};

/// Object key an exe body's `retry()`/`continue()`/`done()` builtin call
/// stamps onto its return value so the evaluator's `StageInvoker`
/// implementation can recognize "this return value is actually a
/// control signal" without the pipeline engine depending on exec
/// invocation internals.
const SIGNAL_MARKER_KEY: &str = "__mlld_pipeline_signal__";

pub trait ControlSignal: std::fmt::Debug {
    fn kind(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct RetrySignal {
    pub hint: Option<Value>,
}
impl ControlSignal for RetrySignal {
    fn kind(&self) -> &'static str {
        "retry"
    }
}

#[derive(Debug, Clone)]
pub struct ContinueSignal;
impl ControlSignal for ContinueSignal {
    fn kind(&self) -> &'static str {
        "continue"
    }
}

#[derive(Debug, Clone)]
pub struct DoneSignal {
    pub value: Value,
}
impl ControlSignal for DoneSignal {
    fn kind(&self) -> &'static str {
        "done"
    }
}

/// Raised by a pipeline stage body to steer the pipeline loop rather
/// than to report failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineSignal {
    #[error("retry requested")]
    Retry(RetrySignal),
    #[error("continue requested")]
    Continue(ContinueSignal),
    #[error("done requested")]
    Done(DoneSignal),
}

impl From<RetrySignal> for PipelineSignal {
    fn from(s: RetrySignal) -> Self {
        PipelineSignal::Retry(s)
    }
}
impl From<ContinueSignal> for PipelineSignal {
    fn from(s: ContinueSignal) -> Self {
        PipelineSignal::Continue(s)
    }
}
impl From<DoneSignal> for PipelineSignal {
    fn from(s: DoneSignal) -> Self {
        PipelineSignal::Done(s)
    }
}

/// What a stage invocation produced: a plain value, or a control signal
/// that the pipeline loop must act on instead of advancing normally.
#[derive(Debug, Clone)]
pub enum StageOutcome {
    Value(Value),
    Signal(PipelineSignal),
}

/// Encodes a signal as the return value of an exe body's `retry()`/
/// `continue()`/`done()` builtin call.
pub fn encode_signal(signal: PipelineSignal) -> Value {
    let mut fields = indexmap::IndexMap::new();
    match signal {
        PipelineSignal::Retry(r) => {
            fields.insert("kind".to_string(), Value::text("retry"));
            if let Some(hint) = r.hint {
                fields.insert("hint".to_string(), hint);
            }
        }
        PipelineSignal::Continue(_) => {
            fields.insert("kind".to_string(), Value::text("continue"));
        }
        PipelineSignal::Done(d) => {
            fields.insert("kind".to_string(), Value::text("done"));
            fields.insert("value".to_string(), d.value);
        }
    }
    Value::new(ValueData::Object({
        let mut outer = indexmap::IndexMap::new();
        outer.insert(SIGNAL_MARKER_KEY.to_string(), Value::new(ValueData::Object(fields)));
        outer
    }))
}

/// Recovers a [`PipelineSignal`] from a value produced by
/// [`encode_signal`], if `value` is such an encoding.
pub fn decode_signal(value: &Value) -> Option<PipelineSignal> {
    let ValueData::Object(outer) = &value.data else { return None };
    let ValueData::Object(fields) = &outer.get(SIGNAL_MARKER_KEY)?.data else { return None };
    let kind = fields.get("kind")?.as_text()?;
    match kind {
        "retry" => Some(PipelineSignal::Retry(RetrySignal { hint: fields.get("hint").cloned() })),
        "continue" => Some(PipelineSignal::Continue(ContinueSignal)),
        "done" => Some(PipelineSignal::Done(DoneSignal { value: fields.get("value").cloned()? })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_signal_round_trips_with_hint() {
        let signal = PipelineSignal::Retry(RetrySignal { hint: Some(Value::text("try again")) });
        let encoded = encode_signal(signal);
        match decode_signal(&encoded) {
            Some(PipelineSignal::Retry(r)) => assert_eq!(r.hint.unwrap().as_text(), Some("try again")),
            _ => panic!("expected retry signal"),
        }
    }

    #[test]
    fn done_signal_round_trips_with_value() {
        let signal = PipelineSignal::Done(DoneSignal { value: Value::text("final") });
        let encoded = encode_signal(signal);
        match decode_signal(&encoded) {
            Some(PipelineSignal::Done(d)) => assert_eq!(d.value.as_text(), Some("final")),
            _ => panic!("expected done signal"),
        }
    }

    #[test]
    fn plain_value_does_not_decode_as_a_signal() {
        assert!(decode_signal(&Value::text("just a string")).is_none());
    }
}
