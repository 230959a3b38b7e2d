//! Stage-level errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    /// Arguments that parsed but describe an impossible operation.
    #[error("{0}")]
    InvalidArgument(String),

    /// The stage was asked to run its operation rather than describe it.
    #[error(
        "{stage}: execution mode is not available in this build; pass --generate or set {env}=1"
    )]
    ExecutionUnavailable { stage: &'static str, env: &'static str },

    #[error(transparent)]
    Pipeline(#[from] pipegen::Error),
}

pub type Result<T> = std::result::Result<T, StageError>;
