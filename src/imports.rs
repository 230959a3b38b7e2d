//! Import resolution across a fragment sequence.
//!
//! The result is deduplicated and ordered deterministically: standard
//! library paths (no `.` in the path) first, then everything else, each
//! group alphabetical. Repeated assembly of the same input therefore yields
//! the same import block byte for byte.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::fragment::Fragment;
use crate::scan::find_in_code;

/// Record library every generated program depends on.
pub const CORE_IMPORT: &str = "github.com/rosscartlidge/ssql/v2";

/// Fallible-return idiom whose rewrite needs `fmt` and `os`.
pub const FALLIBLE_MARKER: &str = "return fmt.Errorf";

/// Imports needed by the rewritten error path and the default sink.
const ERROR_PATH_IMPORTS: [&str; 2] = ["fmt", "os"];

/// Standard library paths have no domain component.
pub fn is_namespaced(import: &str) -> bool {
    import.contains('.')
}

/// Total order used for the import block.
pub fn import_order(a: &str, b: &str) -> Ordering {
    is_namespaced(a)
        .cmp(&is_namespaced(b))
        .then_with(|| a.cmp(b))
}

/// Accumulates the import set for one program.
#[derive(Debug, Clone)]
pub struct ImportResolver {
    imports: BTreeSet<String>,
}

impl ImportResolver {
    /// Start from the fixed set every program needs.
    pub fn new(core_import: &str) -> Self {
        let mut resolver = Self {
            imports: BTreeSet::new(),
        };
        resolver.add(core_import);
        resolver
    }

    /// Add one import; empty identifiers are ignored.
    pub fn add(&mut self, import: &str) {
        let import = import.trim();
        if !import.is_empty() {
            self.imports.insert(import.to_string());
        }
    }

    /// Imports required by a synthesized sink or rewritten error path.
    pub fn add_error_path(&mut self) {
        for import in ERROR_PATH_IMPORTS {
            self.add(import);
        }
    }

    /// Union every declared import and add the error-path imports if any
    /// body uses the fallible-return idiom.
    pub fn scan(&mut self, fragments: &[Fragment]) {
        if fragments
            .iter()
            .any(|f| find_in_code(f.body(), FALLIBLE_MARKER).is_some())
        {
            self.add_error_path();
        }
        for fragment in fragments {
            for import in fragment.required_imports() {
                self.add(import);
            }
        }
    }

    /// The ordered, deduplicated import list.
    pub fn resolve(self) -> Vec<String> {
        let mut imports: Vec<String> = self.imports.into_iter().collect();
        imports.sort_by(|a, b| import_order(a, b));
        imports
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_dedup_and_order() {
        let fragments = vec![
            Fragment::initial("records", "records := source()", vec!["strings".into()], ""),
            Fragment::transform(
                "filtered",
                "records",
                "filtered := whereOp(records)",
                vec!["strings".into(), "regexp".into()],
                "",
            ),
            Fragment::terminal("filtered", "sink(filtered)", vec![], ""),
        ];

        let mut resolver = ImportResolver::new(CORE_IMPORT);
        resolver.scan(&fragments);
        assert_eq!(
            resolver.resolve(),
            vec!["regexp", "strings", "github.com/rosscartlidge/ssql/v2"]
        );
    }

    #[test]
    fn test_fallible_body_adds_error_path_imports() {
        let fragments = vec![Fragment::initial(
            "records",
            "records, err := ssql.ReadCSV(\"in.csv\")\nif err != nil {\n\treturn fmt.Errorf(\"reading CSV: %w\", err)\n}",
            vec![],
            "",
        )];
        let mut resolver = ImportResolver::new(CORE_IMPORT);
        resolver.scan(&fragments);
        assert_eq!(
            resolver.resolve(),
            vec!["fmt", "os", "github.com/rosscartlidge/ssql/v2"]
        );
    }

    #[test]
    fn test_marker_inside_string_is_ignored() {
        let fragments = vec![Fragment::terminal(
            "records",
            "fmt.Println(\"return fmt.Errorf\")",
            vec!["fmt".into()],
            "",
        )];
        let mut resolver = ImportResolver::new(CORE_IMPORT);
        resolver.scan(&fragments);
        assert_eq!(resolver.resolve(), vec!["fmt", CORE_IMPORT]);
    }

    #[test]
    fn test_empty_identifiers_are_dropped() {
        let mut resolver = ImportResolver::new(CORE_IMPORT);
        resolver.add("");
        resolver.add("  ");
        assert_eq!(resolver.resolve(), vec![CORE_IMPORT]);
    }

    #[test]
    fn test_namespaced_sort_after_stdlib() {
        let mut imports = vec!["github.com/b/x", "os", "example.com/a", "encoding/json"];
        imports.sort_by(|a, b| import_order(a, b));
        assert_eq!(
            imports,
            vec!["encoding/json", "os", "example.com/a", "github.com/b/x"]
        );
    }
}
