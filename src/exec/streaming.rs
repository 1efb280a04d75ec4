//! NDJSON streaming support for long-running exec invocations (spec
//! §4.6, §6 "JSON-RPC live transport" feeds off the same event shape).

use crate::errors::{MlldError, MlldResult};

#[derive(Debug, Clone)]
pub enum StreamEvent {
    Line(serde_json::Value),
    /// A line that didn't parse as JSON — passed through as raw text
    /// rather than dropped, so non-NDJSON-aware commands still stream.
    Raw(String),
}

/// Parses one chunk of NDJSON/text output into stream events. Safe to
/// call repeatedly on successive chunks of a stdout stream; a chunk
/// that doesn't end on a line boundary should have its trailing partial
/// line carried over by the caller.
pub fn parse_ndjson_chunk(chunk: &str) -> Vec<StreamEvent> {
    chunk
        .lines()
        .filter(|line| !line.is_empty())
        .map(|line| match serde_json::from_str::<serde_json::Value>(line) {
            Ok(value) => StreamEvent::Line(value),
            Err(_) => StreamEvent::Raw(line.to_string()),
        })
        .collect()
}

/// Buffers partial lines across chunk boundaries from a streaming
/// source (e.g. a child process's stdout pipe).
#[derive(Debug, Clone, Default)]
pub struct NdjsonBuffer {
    partial: String,
}

impl NdjsonBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a raw chunk in, returning complete events and retaining any
    /// trailing partial line for the next call.
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.partial.push_str(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.partial.find('\n') {
            let line = self.partial[..pos].to_string();
            self.partial.drain(..=pos);
            if !line.is_empty() {
                events.push(match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(value) => StreamEvent::Line(value),
                    Err(_) => StreamEvent::Raw(line),
                });
            }
        }
        events
    }

    /// Flushes a final, non-newline-terminated line at stream end.
    pub fn finish(mut self) -> MlldResult<Option<StreamEvent>> {
        if self.partial.is_empty() {
            return Ok(None);
        }
        let line = std::mem::take(&mut self.partial);
        Ok(Some(match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(value) => StreamEvent::Line(value),
            Err(_) => StreamEvent::Raw(line),
        }))
    }
}

pub fn require_json_object(event: &StreamEvent) -> MlldResult<&serde_json::Map<String, serde_json::Value>> {
    match event {
        StreamEvent::Line(serde_json::Value::Object(map)) => Ok(map),
        StreamEvent::Line(_) => Err(MlldError::InvalidValueType {
            expected: vec!["object".to_string()],
            actual: "non-object JSON line".to_string(),
        }),
        StreamEvent::Raw(_) => Err(MlldError::InvalidValueType {
            expected: vec!["object".to_string()],
            actual: "raw text line".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_ndjson_lines() {
        let events = parse_ndjson_chunk("{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn non_json_line_becomes_raw_event() {
        let events = parse_ndjson_chunk("plain text\n");
        assert!(matches!(events[0], StreamEvent::Raw(_)));
    }

    #[test]
    fn buffer_carries_partial_line_across_feeds() {
        let mut buf = NdjsonBuffer::new();
        let first = buf.feed("{\"a\":");
        assert!(first.is_empty());
        let second = buf.feed("1}\n");
        assert_eq!(second.len(), 1);
    }

    #[test]
    fn finish_flushes_trailing_partial_line() {
        let mut buf = NdjsonBuffer::new();
        buf.feed("{\"a\":1}");
        let flushed = buf.finish().unwrap();
        assert!(flushed.is_some());
    }
}
