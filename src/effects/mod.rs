//! Effect emitter & document reconstruction (spec §4.10, component
//! C10): turns an [`IntentStream`] into the final rendered document,
//! collapsing directive-boundary breaks and delegating value formatting
//! to the requested output format.

use crate::env::{Intent, IntentStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Markdown,
    Xml,
}

/// At most this many consecutive newlines survive into the rendered
/// document, regardless of how many `Break` intents were pushed in a
/// row (spec §4.10).
const MAX_CONSECUTIVE_NEWLINES: usize = 2;

pub fn reconstruct(stream: &IntentStream, format: DocumentFormat) -> String {
    let mut out = String::new();
    let mut trailing_newlines = 0usize;

    for intent in stream.entries() {
        match intent {
            Intent::Content(text) => {
                if text.is_empty() {
                    continue;
                }
                out.push_str(text);
                trailing_newlines = trailing_newline_count(text);
            }
            Intent::Break => {
                if trailing_newlines >= MAX_CONSECUTIVE_NEWLINES {
                    continue;
                }
                out.push('\n');
                trailing_newlines += 1;
            }
            Intent::Error(err) => {
                out.push_str(&format_error(err, format));
                trailing_newlines = 0;
            }
        }
    }

    out
}

fn trailing_newline_count(text: &str) -> usize {
    text.chars().rev().take_while(|c| *c == '\n').count()
}

fn format_error(err: &crate::errors::MlldError, format: DocumentFormat) -> String {
    match format {
        DocumentFormat::Markdown => format!("\n> **Error** ({}): {}\n", err.code(), err),
        DocumentFormat::Xml => format!("<error code=\"{}\">{}</error>", err.code(), err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_more_than_two_consecutive_breaks() {
        let mut stream = IntentStream::new();
        stream.push_content("a");
        stream.push_break();
        stream.push_break();
        stream.push_break();
        stream.push_break();
        stream.push_content("b");

        let doc = reconstruct(&stream, DocumentFormat::Markdown);
        assert_eq!(doc, "a\n\nb");
    }

    #[test]
    fn plain_content_concatenates_directly() {
        let mut stream = IntentStream::new();
        stream.push_content("hello ");
        stream.push_content("world");
        assert_eq!(reconstruct(&stream, DocumentFormat::Markdown), "hello world");
    }

    #[test]
    fn error_intent_renders_inline_markdown_blockquote() {
        let mut stream = IntentStream::new();
        stream.push(Intent::Error(crate::errors::MlldError::Cancelled));
        let doc = reconstruct(&stream, DocumentFormat::Markdown);
        assert!(doc.contains("CANCELLED"));
    }
}
