//! Intent stream entries (spec §3 "Intents"): the write side of
//! `/show`, `/output`, and error propagation before C10 renders them into
//! the final document.

use crate::errors::MlldError;

#[derive(Debug, Clone)]
pub enum Intent {
    /// Literal text or a rendered value, headed for the document.
    Content(String),
    /// A directive-boundary newline, subject to collapsing in C10.
    Break,
    /// A recovered error surfaced inline rather than aborting evaluation.
    Error(MlldError),
}

/// Append-only log of intents produced while walking one document.
#[derive(Debug, Clone, Default)]
pub struct IntentStream {
    entries: Vec<Intent>,
}

impl IntentStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, intent: Intent) {
        self.entries.push(intent);
    }

    pub fn push_content(&mut self, text: impl Into<String>) {
        self.push(Intent::Content(text.into()));
    }

    pub fn push_break(&mut self) {
        self.push(Intent::Break);
    }

    pub fn entries(&self) -> &[Intent] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Intent> {
        self.entries
    }

    pub fn extend(&mut self, other: IntentStream) {
        self.entries.extend(other.entries);
    }
}
