//! Escaping strategies applied to interpolated parts (spec §4.4).
//!
//! Which strategy applies depends on where the interpolation is headed:
//! a `/run` command line needs shell escaping, a JSON object field needs
//! quoted-string escaping, plain document text needs none.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscapingStrategy {
    None,
    Shell,
    Quoted,
}

impl EscapingStrategy {
    pub fn apply(self, input: &str) -> String {
        match self {
            EscapingStrategy::None => input.to_string(),
            EscapingStrategy::Shell => shell_escape(input),
            EscapingStrategy::Quoted => quoted_escape(input),
        }
    }
}

/// Single-quote the whole string, escaping embedded single quotes the
/// POSIX way: close the quote, emit an escaped quote, reopen it.
fn shell_escape(input: &str) -> String {
    if !input.is_empty() && input.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/' | '.')) {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len() + 2);
    out.push('\'');
    for ch in input.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

fn quoted_escape(input: &str) -> String {
    serde_json::Value::String(input.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_escape_leaves_plain_tokens_alone() {
        assert_eq!(EscapingStrategy::Shell.apply("plain-token"), "plain-token");
    }

    #[test]
    fn shell_escape_quotes_and_escapes_apostrophes() {
        assert_eq!(EscapingStrategy::Shell.apply("it's"), "'it'\\''s'");
    }

    #[test]
    fn quoted_escape_produces_json_string_literal() {
        assert_eq!(EscapingStrategy::Quoted.apply("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn none_is_identity() {
        assert_eq!(EscapingStrategy::None.apply("anything at all"), "anything at all");
    }
}
