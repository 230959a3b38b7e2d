//! Fragment emitters: one rendering per stage.
//!
//! Bodies are Go statements written as they appear inside `main`. The first
//! line carries no indentation (the assembler adds it); continuation lines
//! carry their final indentation.

use pipegen::{Forwarder, Fragment};

use crate::golang::{self, quote};
use crate::stage::{AggregateFn, Aggregation, Condition, Filter, Operator, Stage};

/// Package providing `MustCompileExprFilter` to generated programs.
pub const RUNTIME_IMPORT: &str = "github.com/rosscartlidge/ssql/v2/cmd/ssql/lib/runtime";

/// Describe `stage` as the fragment that follows `forwarder`'s upstream.
pub fn describe(stage: &Stage, forwarder: &Forwarder) -> Fragment {
    let input = forwarder.input_name();
    let origin = forwarder.origin_command();

    match stage {
        Stage::ReadCsv { file } => read_source(forwarder, file.as_deref(), "CSV"),
        Stage::ReadJson { file } => read_source(forwarder, file.as_deref(), "JSON"),
        Stage::Where { filter } => where_filter(forwarder, filter),
        Stage::Limit { n } => Step::new(format!("ssql.Limit[ssql.Record]({n})")).emit(forwarder, "limited"),
        Stage::Offset { n } => Step::new(format!("ssql.Offset[ssql.Record]({n})")).emit(forwarder, "skipped"),
        Stage::Sort { field, desc } => {
            let sign = if *desc { "-" } else { "" };
            Step::new(format!(
                "ssql.SortBy(func(r ssql.Record) float64 {{\n\t\treturn {sign}ssql.GetOr(r, {}, 0.0)\n\t}})",
                quote(field)
            ))
            .emit(forwarder, "sorted")
        }
        Stage::Distinct => Step::new(
            "ssql.DistinctBy(func(r ssql.Record) string {\n\t\treturn fmt.Sprintf(\"%v\", r)\n\t})",
        )
        .import("fmt")
        .emit(forwarder, "distinct"),
        Stage::Include { fields } => {
            let keep = fields
                .iter()
                .map(|f| format!("{}: true", quote(f)))
                .collect::<Vec<_>>()
                .join(", ");
            Step::new(format!(
                "ssql.Select(func(r ssql.Record) ssql.Record {{\n\
                 \t\tincludedMap := map[string]bool{{{keep}}}\n\
                 \t\tmut := r.ToMutable()\n\
                 \t\tfor k := range r.All() {{\n\
                 \t\t\tif !includedMap[k] {{\n\
                 \t\t\t\tmut = mut.Delete(k)\n\
                 \t\t\t}}\n\
                 \t\t}}\n\
                 \t\treturn mut.Freeze()\n\
                 \t}})"
            ))
            .emit(forwarder, "included")
        }
        Stage::Exclude { fields } => {
            let deletes: String = fields
                .iter()
                .map(|f| format!("\n\t\tmut = mut.Delete({})", quote(f)))
                .collect();
            Step::new(select_mutation(&deletes)).emit(forwarder, "excluded")
        }
        Stage::Rename { pairs } => {
            let renames: String = pairs
                .iter()
                .map(|(old, new)| format!("\n\t\tmut = mut.Rename({}, {})", quote(old), quote(new)))
                .collect();
            Step::new(select_mutation(&renames)).emit(forwarder, "renamed")
        }
        Stage::Update {
            assignments,
            conditions,
        } => update(forwarder, assignments, conditions),
        Stage::GroupBy {
            fields,
            aggregations,
        } => group_by(forwarder, fields, aggregations),
        Stage::WriteCsv { file } => {
            let call = match file {
                Some(path) => format!("ssql.WriteCSV({input}, {})", quote(path)),
                None => format!("ssql.WriteCSVToWriter({input}, os.Stdout)"),
            };
            Fragment::terminal(input, checked_call(&call, "writing CSV"), strings(&["fmt", "os"]), origin)
        }
        Stage::WriteJson { file, pretty } => write_json(forwarder, file.as_deref(), *pretty),
        Stage::Table { max_width } => Fragment::terminal(
            input,
            format!("ssql.DisplayTable({input}, {max_width})"),
            Vec::new(),
            origin,
        ),
        Stage::Chart { x, y, output } => Fragment::terminal(
            input,
            format!(
                "if err := ssql.QuickChart({input}, {}, {}, {}); err != nil {{\n\
                 \t\treturn fmt.Errorf(\"creating chart: %w\", err)\n\
                 \t}}\n\
                 \tfmt.Printf(\"Chart created: %s\\n\", {})",
                quote(x),
                quote(y),
                quote(output),
                quote(output)
            ),
            strings(&["fmt"]),
            origin,
        ),
    }
}

/// A transform under construction: its callee plus anything it needs.
struct Step {
    callee: String,
    hoisted: Option<String>,
    imports: Vec<String>,
}

impl Step {
    fn new(callee: impl Into<String>) -> Self {
        Self {
            callee: callee.into(),
            hoisted: None,
            imports: Vec::new(),
        }
    }

    fn import(mut self, path: &str) -> Self {
        if !self.imports.iter().any(|i| i == path) {
            self.imports.push(path.to_string());
        }
        self
    }

    fn hoist(mut self, declaration: String) -> Self {
        self.hoisted = Some(declaration);
        self
    }

    fn emit(self, forwarder: &Forwarder, base: &str) -> Fragment {
        let input = forwarder.input_name();
        let output = forwarder.output_name(base);
        let statement = format!("{output} := {}({input})", self.callee);
        let body = match self.hoisted {
            Some(declaration) => format!("{declaration}\n{statement}"),
            None => statement,
        };
        Fragment::transform(output, input, body, self.imports, forwarder.origin_command())
            .with_callee(self.callee)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn select_mutation(statements: &str) -> String {
    format!(
        "ssql.Select(func(r ssql.Record) ssql.Record {{\n\
         \t\tmut := r.ToMutable(){statements}\n\
         \t\treturn mut.Freeze()\n\
         \t}})"
    )
}

/// `if err := call; err != nil` with the failure reported and fatal.
fn checked_call(call: &str, action: &str) -> String {
    format!(
        "if err := {call}; err != nil {{\n\
         \t\tfmt.Fprintf(os.Stderr, \"Error {action}: %v\\n\", err)\n\
         \t\tos.Exit(1)\n\
         \t}}"
    )
}

fn read_source(forwarder: &Forwarder, file: Option<&str>, format: &str) -> Fragment {
    let output = forwarder.output_name(pipegen::DEFAULT_SOURCE);
    let origin = forwarder.origin_command();
    match file {
        Some(path) => {
            let body = format!(
                "{output}, err := ssql.Read{format}({})\n\
                 \tif err != nil {{\n\
                 \t\treturn fmt.Errorf(\"reading {format}: %w\", err)\n\
                 \t}}",
                quote(path)
            );
            Fragment::initial(output, body, strings(&["fmt"]), origin)
        }
        None => {
            let body = format!("{output} := ssql.Read{format}FromReader(os.Stdin)");
            Fragment::initial(output, body, strings(&["os"]), origin)
        }
    }
}

/// Go boolean expression for `condition` against the record named `record`.
fn condition_code(condition: &Condition, record: &str) -> (String, Option<&'static str>) {
    let field = quote(&condition.field);
    let value = &condition.value;

    match condition.op {
        Operator::Contains => (
            format!("strings.Contains(ssql.GetOr({record}, {field}, \"\"), {})", quote(value)),
            Some("strings"),
        ),
        Operator::StartsWith => (
            format!("strings.HasPrefix(ssql.GetOr({record}, {field}, \"\"), {})", quote(value)),
            Some("strings"),
        ),
        Operator::EndsWith => (
            format!("strings.HasSuffix(ssql.GetOr({record}, {field}, \"\"), {})", quote(value)),
            Some("strings"),
        ),
        Operator::Pattern => (
            format!(
                "regexp.MustCompile({}).MatchString(ssql.GetOr({record}, {field}, \"\"))",
                quote(value)
            ),
            Some("regexp"),
        ),
        op => {
            let symbol = op.symbol().unwrap_or("==");
            let code = match golang::number(value) {
                Some(number) => {
                    format!("ssql.GetOr({record}, {field}, float64(0)) {symbol} {number}")
                }
                None => format!("ssql.GetOr({record}, {field}, \"\") {symbol} {}", quote(value)),
            };
            (code, None)
        }
    }
}

/// Conditions joined with `&&`, or `||` when `any` is set.
fn combined_conditions(conditions: &[Condition], any: bool, record: &str) -> (String, Vec<&'static str>) {
    let mut imports = Vec::new();
    let parts: Vec<String> = conditions
        .iter()
        .map(|c| {
            let (code, import) = condition_code(c, record);
            if let Some(import) = import
                && !imports.contains(&import)
            {
                imports.push(import);
            }
            code
        })
        .collect();

    let joiner = if any { " || " } else { " && " };
    let code = if parts.is_empty() {
        "true".to_string()
    } else {
        parts.join(joiner)
    };
    (code, imports)
}

fn where_filter(forwarder: &Forwarder, filter: &Filter) -> Fragment {
    match filter {
        Filter::Matches { conditions, any } => {
            let (test, imports) = combined_conditions(conditions, *any, "r");
            let step = Step::new(format!(
                "ssql.Where(func(r ssql.Record) bool {{\n\t\treturn {test}\n\t}})"
            ));
            imports
                .into_iter()
                .fold(step, Step::import)
                .emit(forwarder, "filtered")
        }
        Filter::Expr(expr) => {
            let name = format!("exprFilter{}", forwarder.next_hoist_index());
            Step::new(format!("ssql.Where({name})"))
                .hoist(format!(
                    "var {name} = runtime.MustCompileExprFilter({})",
                    quote(expr)
                ))
                .import(RUNTIME_IMPORT)
                .emit(forwarder, "filtered")
        }
    }
}

/// Typed setter for one `--set FIELD VALUE`.
fn assignment(field: &str, value: &str) -> String {
    let field = quote(field);
    if value == "true" || value == "false" {
        format!("mut = mut.Bool({field}, {value})")
    } else if let Some(n) = golang::integer(value) {
        format!("mut = mut.Int({field}, int64({n}))")
    } else if let Some(n) = golang::number(value) {
        format!("mut = mut.Float({field}, {n})")
    } else {
        format!("mut = mut.String({field}, {})", quote(value))
    }
}

fn update(forwarder: &Forwarder, assignments: &[(String, String)], conditions: &[Condition]) -> Fragment {
    let guarded = !conditions.is_empty();
    let indent = if guarded { "\t\t\t" } else { "\t\t" };

    let mut body = String::new();
    let mut imports = Vec::new();
    if guarded {
        let (test, needed) = combined_conditions(conditions, false, "r");
        imports = needed;
        body.push_str(&format!("\t\tr := mut.Freeze()\n\t\tif {test} {{\n"));
    }
    for (field, value) in assignments {
        body.push_str(indent);
        body.push_str(&assignment(field, value));
        body.push('\n');
    }
    if guarded {
        body.push_str("\t\t}\n");
    }

    let step = Step::new(format!(
        "ssql.Update(func(mut ssql.MutableRecord) ssql.MutableRecord {{\n{body}\t\treturn mut\n\t}})"
    ));
    imports
        .into_iter()
        .fold(step, Step::import)
        .emit(forwarder, "updated")
}

fn aggregator(aggregation: &Aggregation) -> String {
    let field = aggregation.field.as_deref().map(quote).unwrap_or_default();
    match aggregation.function {
        AggregateFn::Count => "ssql.Count()".to_string(),
        AggregateFn::Sum => format!("ssql.Sum({field})"),
        AggregateFn::Avg => format!("ssql.Avg({field})"),
        AggregateFn::Min => format!("ssql.Min[float64]({field})"),
        AggregateFn::Max => format!("ssql.Max[float64]({field})"),
    }
}

fn group_by(forwarder: &Forwarder, fields: &[String], aggregations: &[Aggregation]) -> Fragment {
    let keys: String = fields.iter().map(|f| format!(", {}", quote(f))).collect();
    let aggs: String = aggregations
        .iter()
        .map(|a| format!("\t\t\t{}: {},\n", quote(&a.result), aggregator(a)))
        .collect();

    Step::new(format!(
        "ssql.Chain(\n\
         \t\tssql.GroupByFields(\"_group\"{keys}),\n\
         \t\tssql.Aggregate(\"_group\", map[string]ssql.AggregateFunc{{\n\
         {aggs}\
         \t\t}}),\n\
         \t)"
    ))
    .emit(forwarder, "grouped")
}

fn write_json(forwarder: &Forwarder, file: Option<&str>, pretty: bool) -> Fragment {
    let input = forwarder.input_name();
    let origin = forwarder.origin_command();

    match (file, pretty) {
        (Some(path), true) => Fragment::terminal(
            input,
            checked_call(&format!("ssql.WriteJSONPretty({input}, {})", quote(path)), "writing JSON"),
            strings(&["fmt", "os"]),
            origin,
        ),
        (Some(path), false) => Fragment::terminal(
            input,
            checked_call(&format!("ssql.WriteJSON({input}, {})", quote(path)), "writing JSON"),
            strings(&["fmt", "os"]),
            origin,
        ),
        (None, true) => Fragment::terminal(
            input,
            format!(
                "var recordMaps []map[string]interface{{}}\n\
                 \tfor record := range {input} {{\n\
                 \t\tdata := make(map[string]interface{{}})\n\
                 \t\tfor k, v := range record.All() {{\n\
                 \t\t\tdata[k] = v\n\
                 \t\t}}\n\
                 \t\trecordMaps = append(recordMaps, data)\n\
                 \t}}\n\
                 \tjsonBytes, err := json.MarshalIndent(recordMaps, \"\", \"  \")\n\
                 \tif err != nil {{\n\
                 \t\tfmt.Fprintf(os.Stderr, \"Error encoding JSON: %v\\n\", err)\n\
                 \t\tos.Exit(1)\n\
                 \t}}\n\
                 \tif _, err := os.Stdout.Write(append(jsonBytes, '\\n')); err != nil {{\n\
                 \t\tfmt.Fprintf(os.Stderr, \"Error writing JSON: %v\\n\", err)\n\
                 \t\tos.Exit(1)\n\
                 \t}}"
            ),
            strings(&["encoding/json", "fmt", "os"]),
            origin,
        ),
        (None, false) => Fragment::terminal(
            input,
            checked_call(&format!("ssql.WriteJSONToWriter({input}, os.Stdout)"), "writing JSON"),
            strings(&["fmt", "os"]),
            origin,
        ),
    }
}
