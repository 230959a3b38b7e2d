//! Error-path rewrite for bodies emitted into `main`.
//!
//! Stage bodies are written for a caller that can propagate an error with
//! `return fmt.Errorf(...)`. `main` has no such caller, so each occurrence
//! becomes a diagnostic on stderr followed by `os.Exit(1)`. The original
//! `fmt.Errorf(...)` call text is kept inside the diagnostic.

use crate::scan::{find_all_in_code, matching_close};

const RETURN_ERRORF: &str = "return fmt.Errorf(";

/// Leading whitespace of the line containing offset `at`.
fn line_indent(text: &str, at: usize) -> &str {
    let line_start = text[..at].rfind('\n').map_or(0, |p| p + 1);
    let line = &text[line_start..at];
    &line[..line.len() - line.trim_start().len()]
}

/// Rewrite every `return fmt.Errorf(<args>)` in `body`.
///
/// Text outside the idiom is copied unchanged. An occurrence whose call is
/// never closed is left as written.
pub fn rewrite_error_returns(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut copied = 0;

    for at in find_all_in_code(body, RETURN_ERRORF) {
        if at < copied {
            continue;
        }
        let open = at + RETURN_ERRORF.len() - 1;
        let Some(close) = matching_close(body, open) else {
            continue;
        };

        let args = &body[open + 1..close];
        let indent = line_indent(body, at);
        out.push_str(&body[copied..at]);
        out.push_str(&format!(
            "fmt.Fprintf(os.Stderr, \"Error: %v\\n\", fmt.Errorf({args}))\n{indent}os.Exit(1)"
        ));
        copied = close + 1;
    }

    out.push_str(&body[copied..]);
    out
}
