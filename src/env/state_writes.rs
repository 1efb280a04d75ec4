//! Buffered `state://` sink writes (spec §6 "state:// sinks").
//!
//! `/output @x to state://key` doesn't write through immediately — it
//! buffers onto the environment so a host (JSON-RPC transport, or the
//! demo driver) can drain them after the document finishes evaluating,
//! same as just-bash buffers filesystem effects before committing them.

use crate::value::Value;

/// Which sink a buffered write targets: a `state://` key kept in memory
/// for a host to drain, or a real filesystem path (spec §4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateWriteTarget {
    State,
    File,
}

#[derive(Debug, Clone)]
pub struct StateWrite {
    pub key: String,
    pub value: Value,
    pub append: bool,
    pub target: StateWriteTarget,
}

#[derive(Debug, Clone, Default)]
pub struct StateWriteBuffer {
    writes: Vec<StateWrite>,
}

impl StateWriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: StateWrite) {
        self.writes.push(write);
    }

    /// Drains in observed order, keeping only the first of any
    /// `{key, value}` pair that repeats (spec §6: duplicate state-writes
    /// "are deduplicated, stable keep-first"). `append` writes are never
    /// deduped against each other — each one is a distinct mutation of
    /// the sink, not a repeated report of the same event.
    pub fn drain(&mut self) -> Vec<StateWrite> {
        let writes = std::mem::take(&mut self.writes);
        let mut seen = std::collections::HashSet::new();
        writes
            .into_iter()
            .filter(|w| w.append || seen.insert((w.target, w.key.clone(), w.value.to_json().to_string())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_non_append_writes_keep_only_the_first() {
        let mut buf = StateWriteBuffer::new();
        buf.push(StateWrite { key: "t".into(), value: Value::text("x"), append: false, target: StateWriteTarget::State });
        buf.push(StateWrite { key: "t".into(), value: Value::text("x"), append: false, target: StateWriteTarget::State });
        buf.push(StateWrite { key: "t".into(), value: Value::text("y"), append: false, target: StateWriteTarget::State });

        let drained = buf.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].value.as_text(), Some("x"));
        assert_eq!(drained[1].value.as_text(), Some("y"));
    }

    #[test]
    fn append_writes_are_never_deduped() {
        let mut buf = StateWriteBuffer::new();
        buf.push(StateWrite { key: "log".into(), value: Value::text("line"), append: true, target: StateWriteTarget::State });
        buf.push(StateWrite { key: "log".into(), value: Value::text("line"), append: true, target: StateWriteTarget::State });

        assert_eq!(buf.drain().len(), 2);
    }

    #[test]
    fn file_and_state_targets_with_the_same_key_dedupe_independently() {
        let mut buf = StateWriteBuffer::new();
        buf.push(StateWrite { key: "x".into(), value: Value::text("v"), append: false, target: StateWriteTarget::State });
        buf.push(StateWrite { key: "x".into(), value: Value::text("v"), append: false, target: StateWriteTarget::File });

        // Same key and value, but different sinks — both are real writes.
        assert_eq!(buf.drain().len(), 2);
    }
}
