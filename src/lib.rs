//! # pipegen
//!
//! Fragment protocol and program assembler for generation-mode pipelines.
//!
//! Every stage of a `pipegen` pipeline can either run its operation or, in
//! generation mode, describe it as a [`Fragment`]. Fragments travel between
//! the pipe-connected stage processes as JSON Lines; each stage relays what
//! it received and appends its own. The final stage hands the whole
//! sequence to the [`Assembler`], which reconstitutes the pipeline as one
//! self-contained Go program.
//!
//! ## Overview
//!
//! - **Fragment**: immutable description of one stage (initial, transform
//!   or terminal)
//! - **Protocol**: one fragment per line, empty upstream means "first stage"
//! - **Forwarder**: relay upstream unchanged, append exactly one fragment
//! - **Assembler**: imports, hoisted declarations, composition call, sink
//!
//! ## Example
//!
//! ```
//! use pipegen::{Assembler, Fragment};
//!
//! let fragments = vec![
//!     Fragment::initial("records", r#"records := source("in.csv")"#, vec![], ""),
//!     Fragment::transform("filtered", "records", "filtered := whereOp(records)", vec![], ""),
//!     Fragment::transform("sorted", "filtered", "sorted := sortOp(filtered)", vec![], ""),
//! ];
//!
//! let program = Assembler::default().assemble(&fragments).unwrap();
//!
//! assert!(program.contains("sorted := ssql.Chain(\n\t\twhereOp,\n\t\tsortOp,\n\t)(records)"));
//! assert!(program.contains("ssql.WriteJSONToWriter(sorted, os.Stdout)"));
//! ```

pub mod assembler;
pub mod chain;
pub mod config;
pub mod error;
pub mod forward;
pub mod fragment;
pub mod imports;
pub mod logging;
pub mod protocol;
pub mod rewrite;
pub mod scan;

pub use assembler::{Assembler, AssemblerConfig, ChainBreak, validate_chain, write_program};
pub use chain::{extract_applicable, is_hoisted_line};
pub use config::{GENERATE_ENV, Mode};
pub use error::{Error, Result};
pub use forward::Forwarder;
pub use fragment::{DEFAULT_SOURCE, Fragment, FragmentKind};
pub use imports::{CORE_IMPORT, ImportResolver};
pub use protocol::{read_fragments, read_stdin, write_fragments, write_stdout};
pub use rewrite::rewrite_error_returns;
