//! Validated stage descriptions.
//!
//! A [`Stage`] is what one `pipegen` invocation asks for, after argument
//! checking. Construction is where invalid requests are rejected, so the
//! emitters can render any value they are handed.

use std::fmt;
use std::str::FromStr;

use pipegen::FragmentKind;

use crate::error::{Result, StageError};
use crate::golang;

/// Comparison applied by `--match FIELD OP VALUE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    StartsWith,
    EndsWith,
    Pattern,
}

impl Operator {
    /// Ordering comparisons only make sense against a number.
    pub fn is_ordering(self) -> bool {
        matches!(self, Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le)
    }

    /// Go comparison operator for the relational variants.
    pub fn symbol(self) -> Option<&'static str> {
        match self {
            Operator::Eq => Some("=="),
            Operator::Ne => Some("!="),
            Operator::Gt => Some(">"),
            Operator::Ge => Some(">="),
            Operator::Lt => Some("<"),
            Operator::Le => Some("<="),
            _ => None,
        }
    }
}

impl FromStr for Operator {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Ok(Operator::Eq),
            "ne" => Ok(Operator::Ne),
            "gt" => Ok(Operator::Gt),
            "ge" => Ok(Operator::Ge),
            "lt" => Ok(Operator::Lt),
            "le" => Ok(Operator::Le),
            "contains" => Ok(Operator::Contains),
            "startswith" => Ok(Operator::StartsWith),
            "endswith" => Ok(Operator::EndsWith),
            "pattern" | "regexp" | "regex" => Ok(Operator::Pattern),
            other => Err(StageError::InvalidArgument(format!(
                "unknown operator {other:?} (expected eq, ne, gt, ge, lt, le, contains, startswith, endswith or pattern)"
            ))),
        }
    }
}

/// One `FIELD OP VALUE` test against a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub value: String,
}

impl Condition {
    pub fn new(field: &str, op: &str, value: &str) -> Result<Self> {
        if field.is_empty() {
            return Err(StageError::InvalidArgument(
                "match field must not be empty".to_string(),
            ));
        }
        let op: Operator = op.parse()?;
        if op.is_ordering() && golang::number(value).is_none() {
            return Err(StageError::InvalidArgument(format!(
                "{field}: ordering comparison needs a numeric value, got {value:?}"
            )));
        }
        Ok(Self {
            field: field.to_string(),
            op,
            value: value.to_string(),
        })
    }

    /// Conditions from a flat `FIELD OP VALUE FIELD OP VALUE ...` list.
    pub fn from_triples(args: &[String]) -> Result<Vec<Self>> {
        if args.len() % 3 != 0 {
            return Err(StageError::InvalidArgument(
                "--match takes FIELD OP VALUE".to_string(),
            ));
        }
        args.chunks(3)
            .map(|c| Condition::new(&c[0], &c[1], &c[2]))
            .collect()
    }
}

/// What `where` keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Field tests, all required unless `any` is set.
    Matches { conditions: Vec<Condition>, any: bool },
    /// An expression compiled at program start by the runtime package.
    Expr(String),
}

/// Aggregation function accepted by `group-by --agg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl FromStr for AggregateFn {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(AggregateFn::Count),
            "sum" => Ok(AggregateFn::Sum),
            "avg" => Ok(AggregateFn::Avg),
            "min" => Ok(AggregateFn::Min),
            "max" => Ok(AggregateFn::Max),
            other => Err(StageError::InvalidArgument(format!(
                "unknown aggregation function: {other}"
            ))),
        }
    }
}

impl fmt::Display for AggregateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFn::Count => "count",
            AggregateFn::Sum => "sum",
            AggregateFn::Avg => "avg",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
        };
        f.write_str(name)
    }
}

/// `RESULT=FN(FIELD)`, or `RESULT=count` / `RESULT=count()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub result: String,
    pub function: AggregateFn,
    pub field: Option<String>,
}

impl FromStr for Aggregation {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self> {
        let malformed =
            || StageError::InvalidArgument(format!("aggregation {s:?} is not RESULT=FN(FIELD)"));

        let (result, call) = s.split_once('=').ok_or_else(malformed)?;
        let result = result.trim();
        if result.is_empty() {
            return Err(StageError::InvalidArgument(format!(
                "aggregation {s:?} is missing a result name"
            )));
        }

        let call = call.trim();
        let (name, field) = match call.split_once('(') {
            Some((name, rest)) => {
                let field = rest.strip_suffix(')').ok_or_else(malformed)?.trim();
                (name.trim(), (!field.is_empty()).then(|| field.to_string()))
            }
            None => (call, None),
        };

        let function: AggregateFn = name.parse()?;
        if function != AggregateFn::Count && field.is_none() {
            return Err(StageError::InvalidArgument(format!(
                "aggregation function {function} requires a field"
            )));
        }

        Ok(Self {
            result: result.to_string(),
            function,
            field,
        })
    }
}

/// Default column width for `table`.
pub const DEFAULT_TABLE_WIDTH: usize = 50;

/// Default destination for `chart`.
pub const DEFAULT_CHART_FILE: &str = "chart.html";

/// A validated pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// read-csv [FILE] - records from a CSV file or stdin
    ReadCsv { file: Option<String> },
    /// read-json [FILE] - records from a JSON Lines file or stdin
    ReadJson { file: Option<String> },
    /// where - keep records passing a filter
    Where { filter: Filter },
    /// limit N - first N records
    Limit { n: u64 },
    /// offset N - skip N records
    Offset { n: u64 },
    /// sort FIELD [--desc] - numeric sort on one field
    Sort { field: String, desc: bool },
    /// distinct - drop repeated records
    Distinct,
    /// include F... - keep only the named fields
    Include { fields: Vec<String> },
    /// exclude F... - drop the named fields
    Exclude { fields: Vec<String> },
    /// rename OLD NEW ... - rename fields pairwise
    Rename { pairs: Vec<(String, String)> },
    /// update --set F V ... - assign typed values, optionally guarded
    Update {
        assignments: Vec<(String, String)>,
        conditions: Vec<Condition>,
    },
    /// group-by F... --agg R=FN(X) - group and aggregate
    GroupBy {
        fields: Vec<String>,
        aggregations: Vec<Aggregation>,
    },
    /// write-csv [FILE]
    WriteCsv { file: Option<String> },
    /// write-json [FILE] [--pretty]
    WriteJson { file: Option<String>, pretty: bool },
    /// table [--max-width N]
    Table { max_width: usize },
    /// chart X Y [--output FILE]
    Chart { x: String, y: String, output: String },
}

impl Stage {
    pub fn where_matches(conditions: Vec<Condition>, any: bool) -> Self {
        Stage::Where {
            filter: Filter::Matches { conditions, any },
        }
    }

    pub fn where_expr(expr: &str) -> Result<Self> {
        if expr.trim().is_empty() {
            return Err(StageError::InvalidArgument(
                "--expr must not be empty".to_string(),
            ));
        }
        Ok(Stage::Where {
            filter: Filter::Expr(expr.to_string()),
        })
    }

    pub fn limit(n: i64) -> Result<Self> {
        if n <= 0 {
            return Err(StageError::InvalidArgument(format!(
                "limit must be positive, got {n}"
            )));
        }
        Ok(Stage::Limit { n: n as u64 })
    }

    pub fn offset(n: i64) -> Result<Self> {
        if n < 0 {
            return Err(StageError::InvalidArgument(format!(
                "offset must not be negative, got {n}"
            )));
        }
        Ok(Stage::Offset { n: n as u64 })
    }

    pub fn include(fields: Vec<String>) -> Result<Self> {
        require_fields("include", &fields)?;
        Ok(Stage::Include { fields })
    }

    pub fn exclude(fields: Vec<String>) -> Result<Self> {
        require_fields("exclude", &fields)?;
        Ok(Stage::Exclude { fields })
    }

    pub fn rename(args: Vec<String>) -> Result<Self> {
        if args.is_empty() || args.len() % 2 != 0 {
            return Err(StageError::InvalidArgument(
                "rename takes OLD NEW pairs".to_string(),
            ));
        }
        let pairs = args
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        Ok(Stage::Rename { pairs })
    }

    pub fn update(set_args: &[String], conditions: Vec<Condition>) -> Result<Self> {
        if set_args.is_empty() || set_args.len() % 2 != 0 {
            return Err(StageError::InvalidArgument(
                "update needs at least one --set FIELD VALUE".to_string(),
            ));
        }
        let assignments = set_args
            .chunks(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        Ok(Stage::Update {
            assignments,
            conditions,
        })
    }

    pub fn group_by(fields: Vec<String>, aggregations: Vec<Aggregation>) -> Result<Self> {
        require_fields("group-by", &fields)?;
        if aggregations.is_empty() {
            return Err(StageError::InvalidArgument(
                "no aggregations specified (use --agg RESULT=FN(FIELD))".to_string(),
            ));
        }
        Ok(Stage::GroupBy {
            fields,
            aggregations,
        })
    }

    /// CLI name, used in messages.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::ReadCsv { .. } => "read-csv",
            Stage::ReadJson { .. } => "read-json",
            Stage::Where { .. } => "where",
            Stage::Limit { .. } => "limit",
            Stage::Offset { .. } => "offset",
            Stage::Sort { .. } => "sort",
            Stage::Distinct => "distinct",
            Stage::Include { .. } => "include",
            Stage::Exclude { .. } => "exclude",
            Stage::Rename { .. } => "rename",
            Stage::Update { .. } => "update",
            Stage::GroupBy { .. } => "group-by",
            Stage::WriteCsv { .. } => "write-csv",
            Stage::WriteJson { .. } => "write-json",
            Stage::Table { .. } => "table",
            Stage::Chart { .. } => "chart",
        }
    }

    /// Which kind of fragment this stage emits.
    pub fn kind(&self) -> FragmentKind {
        match self {
            Stage::ReadCsv { .. } | Stage::ReadJson { .. } => FragmentKind::Initial,
            Stage::WriteCsv { .. }
            | Stage::WriteJson { .. }
            | Stage::Table { .. }
            | Stage::Chart { .. } => FragmentKind::Terminal,
            _ => FragmentKind::Transform,
        }
    }
}

fn require_fields(stage: &str, fields: &[String]) -> Result<()> {
    if fields.is_empty() || fields.iter().any(String::is_empty) {
        return Err(StageError::InvalidArgument(format!(
            "{stage} needs at least one non-empty field name"
        )));
    }
    Ok(())
}
