//! `pipegen`: record pipeline stages that can describe themselves as Go.
//!
//! Usage:
//!   export PIPEGEN_GO=1
//!   pipegen read-csv data.csv | pipegen where --match age gt 18 | pipegen generate-go
//!
//! Each stage relays the fragments it receives and appends its own;
//! `generate-go` assembles them into one program.

use std::env;
use std::io;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use pipegen::config::switch_from_flags;
use pipegen::{Assembler, AssemblerConfig, Mode, logging, write_program};
use pipegen_stages::stage::{DEFAULT_CHART_FILE, DEFAULT_TABLE_WIDTH};
use pipegen_stages::{Aggregation, Condition, Result, Stage, origin_command};
use tracing::debug;

/// Unix-style record pipeline stages with Go code generation.
#[derive(Parser)]
#[command(name = "pipegen", version)]
struct Cli {
    /// Describe the stage as a code fragment instead of running it
    #[arg(short = 'g', long, global = true, overrides_with = "no_generate")]
    generate: bool,

    /// Run the stage even if PIPEGEN_GO is set
    #[arg(long, global = true, overrides_with = "generate")]
    no_generate: bool,

    /// Raise log verbosity (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read records from a CSV file (stdin if omitted)
    ReadCsv { file: Option<String> },

    /// Read records from a JSON Lines file (stdin if omitted)
    ReadJson { file: Option<String> },

    /// Keep records that pass a filter
    Where {
        /// Field test, repeatable; all must hold
        #[arg(
            short,
            long = "match",
            num_args = 3,
            value_names = ["FIELD", "OP", "VALUE"],
            action = ArgAction::Append,
            conflicts_with = "expr"
        )]
        matches: Vec<String>,

        /// Keep records passing any --match instead of all
        #[arg(long)]
        any: bool,

        /// Filter expression compiled when the program starts
        #[arg(short, long)]
        expr: Option<String>,
    },

    /// Keep the first N records
    Limit {
        #[arg(allow_negative_numbers = true)]
        n: i64,
    },

    /// Skip the first N records
    Offset {
        #[arg(allow_negative_numbers = true)]
        n: i64,
    },

    /// Sort numerically by a field
    Sort {
        field: String,

        /// Largest first
        #[arg(short, long)]
        desc: bool,
    },

    /// Drop repeated records
    Distinct,

    /// Keep only the named fields
    Include {
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Drop the named fields
    Exclude {
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Rename fields: OLD NEW [OLD NEW ...]
    Rename {
        #[arg(required = true, value_name = "OLD NEW")]
        pairs: Vec<String>,
    },

    /// Assign field values
    Update {
        /// Assignment, repeatable; the value's type is inferred
        #[arg(
            short,
            long = "set",
            num_args = 2,
            value_names = ["FIELD", "VALUE"],
            action = ArgAction::Append,
            required = true
        )]
        set: Vec<String>,

        /// Only update records where every --match holds
        #[arg(
            short,
            long = "match",
            num_args = 3,
            value_names = ["FIELD", "OP", "VALUE"],
            action = ArgAction::Append
        )]
        matches: Vec<String>,
    },

    /// Group by fields and aggregate
    GroupBy {
        #[arg(required = true)]
        fields: Vec<String>,

        /// RESULT=FN(FIELD) with FN one of count, sum, avg, min, max
        #[arg(short, long = "agg", required = true)]
        aggregations: Vec<String>,
    },

    /// Write records as CSV (stdout if omitted)
    WriteCsv { file: Option<String> },

    /// Write records as JSON (stdout if omitted)
    WriteJson {
        file: Option<String>,

        /// Indented JSON array instead of JSON Lines
        #[arg(long)]
        pretty: bool,
    },

    /// Display records as a table
    Table {
        #[arg(long, default_value_t = DEFAULT_TABLE_WIDTH)]
        max_width: usize,
    },

    /// Render an HTML chart of Y against X
    Chart {
        x: String,
        y: String,

        #[arg(short, long, default_value = DEFAULT_CHART_FILE)]
        output: String,
    },

    /// Assemble the fragment stream on stdin into a Go program
    GenerateGo {
        /// Write the program to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fail when a fragment does not consume its predecessor's output
        #[arg(long)]
        strict: bool,
    },
}

impl Commands {
    /// Validate arguments into a stage. `None` for `generate-go`.
    fn into_stage(self) -> Result<Option<Stage>> {
        let stage = match self {
            Commands::ReadCsv { file } => Stage::ReadCsv { file },
            Commands::ReadJson { file } => Stage::ReadJson { file },
            Commands::Where { matches, any, expr } => match expr {
                Some(expr) => Stage::where_expr(&expr)?,
                None => Stage::where_matches(Condition::from_triples(&matches)?, any),
            },
            Commands::Limit { n } => Stage::limit(n)?,
            Commands::Offset { n } => Stage::offset(n)?,
            Commands::Sort { field, desc } => Stage::Sort { field, desc },
            Commands::Distinct => Stage::Distinct,
            Commands::Include { fields } => Stage::include(fields)?,
            Commands::Exclude { fields } => Stage::exclude(fields)?,
            Commands::Rename { pairs } => Stage::rename(pairs)?,
            Commands::Update { set, matches } => {
                Stage::update(&set, Condition::from_triples(&matches)?)?
            }
            Commands::GroupBy {
                fields,
                aggregations,
            } => {
                let aggregations = aggregations
                    .iter()
                    .map(|a| a.parse::<Aggregation>())
                    .collect::<Result<Vec<_>>>()?;
                Stage::group_by(fields, aggregations)?
            }
            Commands::WriteCsv { file } => Stage::WriteCsv { file },
            Commands::WriteJson { file, pretty } => Stage::WriteJson { file, pretty },
            Commands::Table { max_width } => Stage::Table { max_width },
            Commands::Chart { x, y, output } => Stage::Chart { x, y, output },
            Commands::GenerateGo { .. } => return Ok(None),
        };
        Ok(Some(stage))
    }
}

fn generate_go(output: Option<PathBuf>, strict: bool) -> Result<()> {
    let assembler = Assembler::new(AssemblerConfig {
        strict,
        ..AssemblerConfig::default()
    });
    let code = assembler.assemble_reader(io::stdin().lock())?;
    write_program(&code, output.as_deref())?;
    Ok(())
}

fn run(command: Commands, mode: Mode) -> Result<()> {
    if let Commands::GenerateGo { output, strict } = command {
        return generate_go(output, strict);
    }

    let Some(stage) = command.into_stage()? else {
        return Ok(());
    };
    let args: Vec<String> = env::args().collect();
    let origin = origin_command(&args);
    debug!(stage = stage.name(), ?mode, %origin, "running stage");
    pipegen_stages::run(&stage, mode, &origin)
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let mode = Mode::from_env(switch_from_flags(cli.generate, cli.no_generate));

    if let Err(e) = run(cli.command, mode) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
