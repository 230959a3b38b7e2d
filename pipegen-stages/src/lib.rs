//! # pipegen-stages
//!
//! The stages of a `pipegen` pipeline. Each stage validates its arguments
//! into a [`Stage`], and in generation mode relays the upstream fragment
//! stream and appends the fragment [`describe`] renders for it.
//!
//! ```
//! use pipegen_stages::{Stage, generate};
//!
//! let source = generate(&Stage::ReadCsv { file: None }, Vec::new(), "pipegen read-csv");
//! let limited = generate(&Stage::limit(10).unwrap(), source, "pipegen limit 10");
//!
//! assert_eq!(limited.len(), 2);
//! assert_eq!(limited[1].input_name(), "records");
//! assert_eq!(limited[1].output_name(), "limited");
//! ```

pub mod command;
pub mod emit;
pub mod error;
mod golang;
pub mod stage;

use std::io;

use pipegen::{Forwarder, Fragment, GENERATE_ENV, Mode};
use tracing::debug;

pub use command::{origin_command, shell_quote};
pub use emit::{RUNTIME_IMPORT, describe};
pub use error::{Result, StageError};
pub use stage::{AggregateFn, Aggregation, Condition, Filter, Operator, Stage};

/// The downstream sequence for `stage`: `upstream` followed by its fragment.
pub fn generate(stage: &Stage, upstream: Vec<Fragment>, origin: impl Into<String>) -> Vec<Fragment> {
    let forwarder = Forwarder::new(upstream, origin);
    let fragment = describe(stage, &forwarder);
    forwarder.finish(fragment)
}

/// Run `stage` as one process of a pipeline: fragments in on stdin, the
/// extended stream out on stdout.
pub fn run(stage: &Stage, mode: Mode, origin: &str) -> Result<()> {
    if !mode.is_generate() {
        return Err(StageError::ExecutionUnavailable {
            stage: stage.name(),
            env: GENERATE_ENV,
        });
    }

    let upstream = pipegen::read_stdin()?;
    debug!(stage = stage.name(), upstream = upstream.len(), "describing stage");

    let forwarder = Forwarder::new(upstream, origin);
    let fragment = describe(stage, &forwarder);
    forwarder.emit(io::stdout().lock(), fragment)?;
    Ok(())
}
