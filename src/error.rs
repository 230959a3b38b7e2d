//! Error types for the fragment protocol and the assembler.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A line on the fragment stream could not be decoded.
    #[error("decoding fragment on line {line}: {message}")]
    Protocol { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("encoding fragment: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("nothing to assemble: no code fragments received")]
    NothingToAssemble,

    /// A fragment does not consume its predecessor's output.
    #[error("broken chain at fragment {index}: expected input '{expected}', found '{found}'")]
    BrokenChain {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("writing output file '{}': {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
