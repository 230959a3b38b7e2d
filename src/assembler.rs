//! Terminal consumer: reconstitute a whole pipeline as one Go program.
//!
//! The assembler needs the complete fragment sequence before it writes a
//! single byte, because the import block and the shape of the transform
//! chain depend on every fragment.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use tracing::{debug, info, warn};

use crate::chain::{assignment_count, extract_applicable, hoisted_declarations, strip_hoisted};
use crate::config::GENERATE_ENV;
use crate::error::{Error, Result};
use crate::fragment::{DEFAULT_SOURCE, Fragment, FragmentKind};
use crate::imports::{CORE_IMPORT, ImportResolver, is_namespaced};
use crate::protocol::read_fragments;
use crate::rewrite::rewrite_error_returns;

/// Invocation that runs the assembler, as shown in the audit comment.
pub const ASSEMBLE_COMMAND: &str = "pipegen generate-go";

/// Assembly settings.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Import path of the record library.
    pub core_import: String,
    /// Package identifier the record library is referenced by.
    pub core_package: String,
    /// Version recorded in the header comment.
    pub version: String,
    /// Treat a broken input/output chain as fatal instead of a warning.
    pub strict: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            core_import: CORE_IMPORT.to_string(),
            core_package: "ssql".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            strict: false,
        }
    }
}

/// A fragment whose input is not its predecessor's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    pub index: usize,
    pub expected: String,
    pub found: String,
}

/// Check that every consuming fragment reads the most recently bound
/// output (or the default source when nothing is bound yet).
///
/// Only the first initial fragment seeds the chain; later initials bind
/// nothing the chain may consume.
pub fn validate_chain(fragments: &[Fragment]) -> Vec<ChainBreak> {
    let mut breaks = Vec::new();
    let mut bound = DEFAULT_SOURCE;
    let mut seeded = false;

    for (index, fragment) in fragments.iter().enumerate() {
        if fragment.kind() == FragmentKind::Initial {
            if !seeded && !fragment.output_name().is_empty() {
                bound = fragment.output_name();
            }
            seeded = true;
            continue;
        }
        if fragment.input_name() != bound {
            breaks.push(ChainBreak {
                index,
                expected: bound.to_string(),
                found: fragment.input_name().to_string(),
            });
        }
        if !fragment.output_name().is_empty() {
            bound = fragment.output_name();
        }
    }
    breaks
}

/// Fragments grouped by role, each group in stream order.
struct Partition<'a> {
    initial: Vec<&'a Fragment>,
    transform: Vec<&'a Fragment>,
    terminal: Vec<&'a Fragment>,
}

impl<'a> Partition<'a> {
    fn new(fragments: &'a [Fragment]) -> Self {
        let mut partition = Self {
            initial: Vec::new(),
            transform: Vec::new(),
            terminal: Vec::new(),
        };
        for fragment in fragments {
            match fragment.kind() {
                FragmentKind::Initial => partition.initial.push(fragment),
                FragmentKind::Transform => partition.transform.push(fragment),
                FragmentKind::Terminal => partition.terminal.push(fragment),
            }
        }
        partition
    }

    /// Symbol the transform chain is applied to.
    fn source(&self) -> &'a str {
        self.initial
            .first()
            .map(|f| f.output_name())
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_SOURCE)
    }

    /// Last pipeline variable, for the synthesized sink.
    fn last_variable(&self) -> &'a str {
        self.transform
            .last()
            .map(|f| f.output_name())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.source())
    }
}

/// Growing program text.
struct Emitter {
    code: String,
}

impl Emitter {
    fn new() -> Self {
        Self {
            code: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        self.code.push_str(text);
        self.code.push('\n');
    }

    fn blank(&mut self) {
        self.code.push('\n');
    }

    /// Emit a stage body inside `main`: hoisted declarations removed, first
    /// line indented one level, error returns rewritten.
    fn body(&mut self, body: &str) {
        let stripped = strip_hoisted(body);
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            return;
        }
        let indented = format!("\t{trimmed}");
        self.line(&rewrite_error_returns(&indented));
    }

    fn finish(self) -> String {
        self.code
    }
}

/// Builds program text from fragment sequences.
#[derive(Debug, Clone, Default)]
pub struct Assembler {
    config: AssemblerConfig,
}

impl Assembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    /// Read the whole stream from `reader`, then assemble it.
    pub fn assemble_reader<R: BufRead>(&self, reader: R) -> Result<String> {
        let fragments = read_fragments(reader)?;
        self.assemble(&fragments)
    }

    /// Assemble a complete fragment sequence into Go source text.
    pub fn assemble(&self, fragments: &[Fragment]) -> Result<String> {
        if fragments.is_empty() {
            return Err(Error::NothingToAssemble);
        }

        for brk in validate_chain(fragments) {
            if self.config.strict {
                return Err(Error::BrokenChain {
                    index: brk.index,
                    expected: brk.expected,
                    found: brk.found,
                });
            }
            warn!(
                index = brk.index,
                expected = %brk.expected,
                found = %brk.found,
                "fragment does not consume its predecessor's output"
            );
        }

        let parts = Partition::new(fragments);

        let mut resolver = ImportResolver::new(&self.config.core_import);
        resolver.scan(fragments);
        if parts.terminal.is_empty() {
            resolver.add_error_path();
        }
        let imports = resolver.resolve();

        let mut out = Emitter::new();
        self.emit_header(&mut out, fragments, &imports);
        emit_hoisted(&mut out, fragments);

        out.line("func main() {");
        for fragment in &parts.initial {
            out.body(fragment.body());
        }
        self.emit_transforms(&mut out, &parts);
        self.emit_terminals(&mut out, &parts);
        out.line("}");

        info!(
            initial = parts.initial.len(),
            transform = parts.transform.len(),
            terminal = parts.terminal.len(),
            imports = imports.len(),
            "assembled program"
        );
        Ok(out.finish())
    }

    fn emit_header(&self, out: &mut Emitter, fragments: &[Fragment], imports: &[String]) {
        out.line("package main");
        out.blank();

        let commands: Vec<&str> = fragments
            .iter()
            .map(Fragment::origin_command)
            .filter(|c| !c.is_empty())
            .collect();
        if !commands.is_empty() {
            out.line("/*");
            out.line(&format!("Generated by pipegen {}:", self.config.version));
            out.blank();
            out.line(&format!("export {GENERATE_ENV}=1"));
            for command in commands {
                // A stray "*/" would end the comment early.
                out.line(&format!("{} |", command.replace("*/", "* /")));
            }
            out.line(ASSEMBLE_COMMAND);
            out.line(&format!("unset {GENERATE_ENV}"));
            out.line("*/");
            out.blank();
        }

        // Standard library first, then a blank line, then namespaced paths.
        out.line("import (");
        let mut previous: Option<&str> = None;
        for import in imports {
            if let Some(prev) = previous
                && !is_namespaced(prev)
                && is_namespaced(import)
            {
                out.blank();
            }
            out.line(&format!("\t\"{import}\""));
            previous = Some(import);
        }
        out.line(")");
        out.blank();
    }

    fn emit_transforms(&self, out: &mut Emitter, parts: &Partition<'_>) {
        match parts.transform.as_slice() {
            [] => {}
            [only] => out.body(only.body()),
            many => {
                let target = many
                    .last()
                    .map(|f| f.output_name())
                    .unwrap_or(DEFAULT_SOURCE);
                out.line(&format!(
                    "\t{target} := {}.Chain(",
                    self.config.core_package
                ));
                for fragment in many {
                    out.line(&format!("\t\t{},", applicable_expression(fragment)));
                }
                out.line(&format!("\t)({})", parts.source()));
            }
        }
    }

    fn emit_terminals(&self, out: &mut Emitter, parts: &Partition<'_>) {
        if !parts.terminal.is_empty() {
            for fragment in &parts.terminal {
                out.body(fragment.body());
            }
            return;
        }

        let var = parts.last_variable();
        let pkg = &self.config.core_package;
        out.line("\t// Output records as JSONL");
        out.line(&format!(
            "\tif err := {pkg}.WriteJSONToWriter({var}, os.Stdout); err != nil {{"
        ));
        out.line("\t\tfmt.Fprintf(os.Stderr, \"Error writing output: %v\\n\", err)");
        out.line("\t\tos.Exit(1)");
        out.line("\t}");
    }
}

/// File-scope declarations, deduplicated by exact text, first seen first.
fn emit_hoisted(out: &mut Emitter, fragments: &[Fragment]) {
    let mut seen: Vec<&str> = Vec::new();
    for decl in fragments.iter().flat_map(|f| hoisted_declarations(f.body())) {
        if !seen.contains(&decl) {
            seen.push(decl);
        }
    }
    if seen.is_empty() {
        return;
    }
    for decl in seen {
        out.line(decl);
    }
    out.blank();
}

/// The expression a transform contributes to the composition call.
fn applicable_expression(fragment: &Fragment) -> String {
    if let Some(callee) = fragment.callee() {
        return callee.to_string();
    }
    let assignments = assignment_count(fragment.body());
    if assignments > 1 {
        debug!(
            output = fragment.output_name(),
            assignments, "several statements in transform body; extracting from the first assignment"
        );
    }
    extract_applicable(fragment.body()).unwrap_or_else(|| {
        warn!(
            output = fragment.output_name(),
            "transform body does not match `out := expr(input)`; including it verbatim"
        );
        strip_hoisted(fragment.body()).trim().to_string()
    })
}

/// Write program text to `path`, or to stdout when no path is given.
///
/// A confirmation line goes to stderr in the file case.
pub fn write_program(code: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent).map_err(|source| Error::Output {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
            fs::write(path, code).map_err(|source| Error::Output {
                path: path.to_path_buf(),
                source,
            })?;
            eprintln!("Generated Go code written to {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(code.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scenario() -> Vec<Fragment> {
        vec![
            Fragment::initial("records", r#"records := source("in.csv")"#, vec![], ""),
            Fragment::transform(
                "filtered",
                "records",
                "filtered := whereOp(records)",
                vec![],
                "",
            ),
            Fragment::transform("sorted", "filtered", "sorted := sortOp(filtered)", vec![], ""),
        ]
    }

    fn assemble(fragments: &[Fragment]) -> String {
        Assembler::default().assemble(fragments).unwrap()
    }

    #[test]
    fn test_end_to_end_scenario() {
        let expected = r#"package main

import (
	"fmt"
	"os"

	"github.com/rosscartlidge/ssql/v2"
)

func main() {
	records := source("in.csv")
	sorted := ssql.Chain(
		whereOp,
		sortOp,
	)(records)
	// Output records as JSONL
	if err := ssql.WriteJSONToWriter(sorted, os.Stdout); err != nil {
		fmt.Fprintf(os.Stderr, "Error writing output: %v\n", err)
		os.Exit(1)
	}
}
"#;
        assert_eq!(assemble(&scenario()), expected);
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let mut fragments = scenario();
        fragments[1] = Fragment::transform(
            "filtered",
            "records",
            "filtered := whereOp(records)",
            vec!["strings".into(), "regexp".into(), "encoding/json".into()],
            "pipegen where -m name contains a",
        );
        assert_eq!(assemble(&fragments), assemble(&fragments));
    }

    #[test]
    fn test_nothing_to_assemble() {
        let err = Assembler::default().assemble(&[]).unwrap_err();
        assert!(matches!(err, Error::NothingToAssemble));
        assert!(err.to_string().contains("nothing to assemble"));
    }

    #[test]
    fn test_single_transform_is_emitted_directly() {
        let fragments = &scenario()[..2];
        let code = assemble(fragments);
        assert!(code.contains("\tfiltered := whereOp(records)\n"));
        assert!(!code.contains("Chain("));
        assert!(code.contains("WriteJSONToWriter(filtered, os.Stdout)"));
    }

    #[test]
    fn test_chain_lists_every_transform_in_order() {
        let mut fragments = scenario();
        fragments.push(Fragment::transform(
            "limited",
            "sorted",
            "limited := ssql.Limit[ssql.Record](3)(sorted)",
            vec![],
            "",
        ));
        let code = assemble(&fragments);
        assert!(code.contains(
            "\tlimited := ssql.Chain(\n\t\twhereOp,\n\t\tsortOp,\n\t\tssql.Limit[ssql.Record](3),\n\t)(records)\n"
        ));
        assert_eq!(code.matches("Chain(").count(), 1);
    }

    #[test]
    fn test_structured_callee_is_preferred() {
        let mut fragments = scenario();
        fragments[1] = Fragment::transform(
            "filtered",
            "records",
            "this body is not the usual shape",
            vec![],
            "",
        )
        .with_callee("ssql.Where(keep)");
        let code = assemble(&fragments);
        assert!(code.contains("\t\tssql.Where(keep),\n\t\tsortOp,\n"));
    }

    #[test]
    fn test_shape_mismatch_degrades_to_verbatim() {
        let mut fragments = scenario();
        fragments[1] = Fragment::transform("filtered", "records", "whereOp", vec![], "");
        let code = assemble(&fragments);
        assert!(code.contains("\t\twhereOp,\n\t\tsortOp,\n"));
    }

    #[test]
    fn test_terminal_suppresses_default_sink() {
        let mut fragments = scenario();
        fragments.push(Fragment::terminal(
            "sorted",
            "ssql.DisplayTable(sorted, 50)",
            vec![],
            "",
        ));
        let code = assemble(&fragments);
        assert!(code.contains("\tssql.DisplayTable(sorted, 50)\n}"));
        assert!(!code.contains("WriteJSONToWriter"));
        assert!(!code.contains("\"os\""));
    }

    #[test]
    fn test_default_sink_on_initial_only() {
        let code = assemble(&scenario()[..1]);
        assert!(code.contains("WriteJSONToWriter(records, os.Stdout)"));
    }

    #[test]
    fn test_error_returns_are_rewritten_in_main() {
        let fragments = vec![Fragment::initial(
            "records",
            "records, err := ssql.ReadCSV(\"in.csv\")\n\tif err != nil {\n\t\treturn fmt.Errorf(\"reading CSV: %w\", err)\n\t}",
            vec![],
            "pipegen read-csv in.csv",
        )];
        let code = assemble(&fragments);
        assert!(!code.contains("return fmt.Errorf"));
        assert!(code.contains(
            "\t\tfmt.Fprintf(os.Stderr, \"Error: %v\\n\", fmt.Errorf(\"reading CSV: %w\", err))\n\t\tos.Exit(1)\n"
        ));
        assert!(code.contains("\t\"fmt\"\n\t\"os\"\n"));
    }

    #[test]
    fn test_precompiled_declarations_are_hoisted_once() {
        let decl = "var exprFilter1 = runtime.MustCompileExprFilter(\"age > 18\")";
        let body = format!("{decl}\nfiltered := ssql.Where(exprFilter1)(records)");
        let fragments = vec![
            Fragment::initial("records", "records := source()", vec![], ""),
            Fragment::transform("filtered", "records", body.clone(), vec![], ""),
            Fragment::transform("filtered1", "filtered", body, vec![], ""),
        ];
        let code = assemble(&fragments);

        assert_eq!(code.matches(decl).count(), 1);
        let decl_at = code.find(decl).unwrap();
        let main_at = code.find("func main() {").unwrap();
        assert!(decl_at < main_at);
        assert!(code.contains("\t\tssql.Where(exprFilter1),\n\t\tssql.Where(exprFilter1),\n"));
    }

    #[test]
    fn test_hoisted_line_removed_from_single_transform() {
        let fragments = vec![Fragment::transform(
            "filtered",
            "records",
            "var exprFilter1 = runtime.MustCompileExprFilter(\"x\")\nfiltered := ssql.Where(exprFilter1)(records)",
            vec![],
            "",
        )];
        let code = assemble(&fragments);
        let main_at = code.find("func main() {").unwrap();
        assert!(!code[main_at..].contains("var exprFilter1"));
        assert!(code.contains("\tfiltered := ssql.Where(exprFilter1)(records)\n"));
    }

    #[test]
    fn test_header_lists_origin_commands() {
        let fragments = vec![
            Fragment::initial("records", "records := source()", vec![], "pipegen read-csv in.csv"),
            Fragment::terminal("records", "sink(records)", vec![], "pipegen table"),
        ];
        let code = assemble(&fragments);
        let version = env!("CARGO_PKG_VERSION");
        let header = format!(
            "/*\nGenerated by pipegen {version}:\n\nexport PIPEGEN_GO=1\npipegen read-csv in.csv |\npipegen table |\npipegen generate-go\nunset PIPEGEN_GO\n*/\n"
        );
        assert!(code.contains(&header));
    }

    #[test]
    fn test_chain_validation() {
        let mut fragments = scenario();
        fragments[2] = Fragment::transform("sorted", "records", "sorted := sortOp(records)", vec![], "");
        let breaks = validate_chain(&fragments);
        assert_eq!(
            breaks,
            vec![ChainBreak {
                index: 2,
                expected: "filtered".into(),
                found: "records".into(),
            }]
        );
        assert!(validate_chain(&scenario()).is_empty());

        // Lenient by default, fatal when strict.
        assert!(Assembler::default().assemble(&fragments).is_ok());
        let strict = Assembler::new(AssemblerConfig {
            strict: true,
            ..AssemblerConfig::default()
        });
        assert!(matches!(
            strict.assemble(&fragments),
            Err(Error::BrokenChain { index: 2, .. })
        ));
    }

    fn two_sources() -> Vec<Fragment> {
        vec![
            Fragment::initial("records", r#"records := source("a.csv")"#, vec![], ""),
            Fragment::initial("records1", r#"records1 := source("b.csv")"#, vec![], ""),
        ]
    }

    #[test]
    fn test_first_initial_seeds_the_chain() {
        let mut fragments = two_sources();
        fragments.extend(scenario().into_iter().skip(1));

        let code = assemble(&fragments);
        assert!(code.contains(
            "\trecords := source(\"a.csv\")\n\trecords1 := source(\"b.csv\")\n"
        ));
        assert!(code.contains("\tsorted := ssql.Chain(\n\t\twhereOp,\n\t\tsortOp,\n\t)(records)\n"));
        assert!(code.contains("ssql.WriteJSONToWriter(sorted, os.Stdout)"));
        assert!(validate_chain(&fragments).is_empty());
    }

    #[test]
    fn test_later_initial_is_not_consumed() {
        let mut fragments = two_sources();
        fragments.push(Fragment::transform(
            "filtered",
            "records1",
            "filtered := whereOp(records1)",
            vec![],
            "",
        ));
        fragments.push(Fragment::transform("sorted", "filtered", "sorted := sortOp(filtered)", vec![], ""));

        assert_eq!(
            validate_chain(&fragments),
            vec![ChainBreak {
                index: 2,
                expected: "records".to_string(),
                found: "records1".to_string(),
            }]
        );
        let code = assemble(&fragments);
        assert!(code.contains("\t)(records)\n"));
    }

    #[test]
    fn test_sink_without_transforms_uses_first_initial() {
        let code = assemble(&two_sources());
        assert!(code.contains("ssql.WriteJSONToWriter(records, os.Stdout)"));
        assert!(!code.contains("WriteJSONToWriter(records1"));
    }

    #[test]
    fn test_assemble_reader() {
        let mut buf = Vec::new();
        crate::protocol::write_fragments(&mut buf, &scenario()).unwrap();
        let code = Assembler::default()
            .assemble_reader(Cursor::new(buf))
            .unwrap();
        assert_eq!(code, assemble(&scenario()));
    }

    #[test]
    fn test_write_program_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("prog.go");
        write_program("package main\n", Some(&path)).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "package main\n");
    }
}
