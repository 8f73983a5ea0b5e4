//! Per-line diagnostics and their caret snippets.

use std::fmt;

/// Marker terminating a caret snippet.
pub const CARET_MARKER: &str = "<--[HERE]";

/// Characters of input shown before the cursor.
const LEFT_CONTEXT: usize = 10;

/// One reported problem in one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The path as the client passed it
    pub path: String,
    /// 1-based line number; 0 when the file itself could not be read
    pub line: usize,
    /// Host-provided message
    pub message: String,
    /// Caret snippet line, if the failure carried an input and cursor
    pub snippet: Option<String>,
}

impl Diagnostic {
    /// A diagnostic without snippet.
    #[must_use]
    pub fn new(path: &str, line: usize, message: impl Into<String>) -> Self {
        Diagnostic {
            path: path.to_string(),
            line,
            message: message.into(),
            snippet: None,
        }
    }

    /// Attach the snippet for `input` at `cursor`, if there is one.
    #[must_use]
    pub fn with_snippet(mut self, input: Option<&str>, cursor: i32) -> Self {
        self.snippet = input.and_then(|input| caret_snippet(input, cursor));
        self
    }

    /// The diagnostic as response lines, each terminated by `\n`.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.path, self.line, self.message)?;
        if let Some(snippet) = &self.snippet {
            write!(f, "\n{snippet}")?;
        }
        Ok(())
    }
}

/// Build the caret line for `input` with the cursor at `cursor` (in characters).
///
/// Four spaces of indent, at most ten characters before the cursor (`...` when more were
/// cut), everything after the cursor, then [`CARET_MARKER`]. Returns `None` for a negative
/// cursor; a cursor beyond the input is clamped to its end.
///
/// ```rust
/// use mcsc::validator::caret_snippet;
///
/// assert_eq!(caret_snippet("say hi", 4).unwrap(), "    say hi<--[HERE]");
/// assert_eq!(
///     caret_snippet("give @p minecraft:apple 1x", 24).unwrap(),
///     "    ...aft:apple 1x<--[HERE]"
/// );
/// ```
#[must_use]
pub fn caret_snippet(input: &str, cursor: i32) -> Option<String> {
    let cursor = usize::try_from(cursor).ok()?;
    let chars: Vec<char> = input.chars().collect();
    let at = cursor.min(chars.len());
    let from = at.saturating_sub(LEFT_CONTEXT);

    let mut snippet = String::from("    ");
    if at > LEFT_CONTEXT {
        snippet.push_str("...");
    }
    snippet.extend(&chars[from..]);
    snippet.push_str(CARET_MARKER);
    Some(snippet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_at_start() {
        assert_eq!(
            caret_snippet("gibe item minecraft:apple", 0).unwrap(),
            "    gibe item minecraft:apple<--[HERE]"
        );
    }

    #[test]
    fn test_long_left_context() {
        let snippet = caret_snippet("give @p minecraft:apple abc", 24).unwrap();
        assert_eq!(snippet, "    ...aft:apple abc<--[HERE]");
    }

    #[test]
    fn test_exactly_ten_before_cursor() {
        assert_eq!(
            caret_snippet("0123456789rest", 10).unwrap(),
            "    0123456789rest<--[HERE]"
        );
    }

    #[test]
    fn test_cursor_at_end() {
        let snippet = caret_snippet("give", 4).unwrap();
        assert_eq!(snippet, "    give<--[HERE]");
        assert_eq!(caret_snippet("give", 99).unwrap(), snippet);
    }

    #[test]
    fn test_negative_cursor() {
        assert!(caret_snippet("give", -1).is_none());
    }

    #[test]
    fn test_multibyte_input() {
        assert_eq!(
            caret_snippet("say ünïcödé", 4).unwrap(),
            "    say ünïcödé<--[HERE]"
        );
    }

    #[test]
    fn test_render() {
        let diagnostic = Diagnostic::new("cmds.txt", 1, "Unknown command")
            .with_snippet(Some("gibe item minecraft:apple"), 0);
        assert_eq!(
            diagnostic.render(),
            "cmds.txt:1: Unknown command\n    gibe item minecraft:apple<--[HERE]\n"
        );
        assert_eq!(
            Diagnostic::new("a.txt", 0, "No such file").with_snippet(None, 3).render(),
            "a.txt:0: No such file\n"
        );
    }
}
