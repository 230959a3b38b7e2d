//! Text-level extraction of the applicable expression from a rendered
//! transform body, and detection of hoistable declarations.
//!
//! Emitters in this workspace attach the applicable expression to the
//! fragment directly (see [`Fragment::callee`](crate::Fragment::callee)).
//! Extraction only runs for fragments that lack it, e.g. streams written by
//! older emitters or by hand.

use crate::scan::{final_call_open, find_all_in_code, find_in_code};

/// Trimmed-line prefix of a package-level declaration.
pub const HOIST_PREFIX: &str = "var ";
/// Constructor marking a declaration as one-time, precompiled state.
pub const HOIST_MARKER: &str = "runtime.MustCompile";

/// Does `line` declare a precompiled artifact that belongs at file scope?
pub fn is_hoisted_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with(HOIST_PREFIX) && trimmed.contains(HOIST_MARKER)
}

/// Hoistable declarations in `body`, trimmed, in order.
pub fn hoisted_declarations(body: &str) -> impl Iterator<Item = &str> {
    body.lines()
        .filter(|line| is_hoisted_line(line))
        .map(str::trim)
}

/// `body` without its hoistable declaration lines.
pub fn strip_hoisted(body: &str) -> String {
    body.lines()
        .filter(|line| !is_hoisted_line(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of `:=` assignments in `body`, outside literals and comments and
/// ignoring hoisted declarations. Extraction anchors on the first one.
pub fn assignment_count(body: &str) -> usize {
    find_all_in_code(&strip_hoisted(body), ":=").len()
}

/// Extract the expression applied to the input in a body shaped like
/// `out := <expr>(<input>)`.
///
/// Returns `None` when the body has no assignment, does not end in a call
/// group, or leaves nothing between the assignment and that group.
pub fn extract_applicable(body: &str) -> Option<String> {
    let code = strip_hoisted(body);
    let start = find_in_code(&code, ":=")? + 2;
    let open = final_call_open(&code, start)?;
    let expr = code[start..open].trim();
    if expr.is_empty() {
        return None;
    }
    Some(expr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_count() {
        assert_eq!(assignment_count("filtered := whereOp(records)"), 1);
        assert_eq!(assignment_count("sink(records)"), 0);
        assert_eq!(
            assignment_count("tmp := prep()\nout := apply(tmp)(records)"),
            2
        );
        assert_eq!(assignment_count("out := f(\":=\")(records)"), 1);
        let hoisted = "var e1 = runtime.MustCompileExprFilter(\"a := b\")\nfiltered := ssql.Where(e1)(records)";
        assert_eq!(assignment_count(hoisted), 1);
    }

    #[test]
    fn test_extract_multi_statement_anchors_on_first_assignment() {
        let body = "tmp := prep()\nout := apply(tmp)(records)";
        assert_eq!(
            extract_applicable(body).as_deref(),
            Some("prep()\nout := apply(tmp)")
        );
    }

    #[test]
    fn test_extract_plain_call() {
        assert_eq!(
            extract_applicable("filtered := whereOp(records)").as_deref(),
            Some("whereOp")
        );
    }

    #[test]
    fn test_extract_curried_call() {
        let body = "limited := ssql.Limit[ssql.Record](10)(records)";
        assert_eq!(
            extract_applicable(body).as_deref(),
            Some("ssql.Limit[ssql.Record](10)")
        );
    }

    #[test]
    fn test_extract_multiline_func_literal() {
        let body = "filtered := ssql.Where(func(r ssql.Record) bool {\n\t\treturn strings.Contains(ssql.GetOr(r, \"name\", \"\"), \")(\")\n\t})(records)";
        let expr = extract_applicable(body).unwrap();
        assert!(expr.starts_with("ssql.Where(func(r ssql.Record) bool {"));
        assert!(expr.ends_with("})"));
        assert!(!expr.contains("(records)"));
    }

    #[test]
    fn test_extract_skips_hoisted_lines() {
        let body = "var exprFilter1 = runtime.MustCompileExprFilter(\"age > 18\")\nfiltered := ssql.Where(exprFilter1)(records)";
        assert_eq!(
            extract_applicable(body).as_deref(),
            Some("ssql.Where(exprFilter1)")
        );
    }

    #[test]
    fn test_extract_shape_mismatch() {
        assert_eq!(extract_applicable("doSomething(records)"), None);
        assert_eq!(extract_applicable("x := y"), None);
        assert_eq!(extract_applicable("x := (records)"), None);
    }

    #[test]
    fn test_hoisted_detection() {
        assert!(is_hoisted_line(
            "  var exprFilter2 = runtime.MustCompileExprFilter(\"x\")"
        ));
        assert!(!is_hoisted_line("var x = 3"));
        assert!(!is_hoisted_line("y := runtime.MustCompileExpr(\"x\")"));
    }

    #[test]
    fn test_strip_and_collect_hoisted() {
        let body = "var e1 = runtime.MustCompileExprFilter(\"a\")\nfiltered := ssql.Where(e1)(records)";
        assert_eq!(strip_hoisted(body), "filtered := ssql.Where(e1)(records)");
        let decls: Vec<&str> = hoisted_declarations(body).collect();
        assert_eq!(decls, vec!["var e1 = runtime.MustCompileExprFilter(\"a\")"]);
    }
}
