use std::path::PathBuf;

use iat_core::ConfigError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("no stimuli available in the active categories")]
    EmptyPool,
}

/// Failures that stop a run from starting or advancing.
#[derive(Debug, Error)]
pub enum SequencerError {
    #[error("invalid experiment configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot draw a stimulus for block {block}: {source}")]
    Selection {
        block: u32,
        #[source]
        source: SelectionError,
    },
}

/// Failures turning an experiment definition into a runnable configuration.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed experiment definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("field `{field}` has unusable value {value:?}")]
    BadField { field: &'static str, value: String },

    #[error("block {block} uses unknown position slot {slot:?}")]
    BadSlot { block: u32, slot: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The submission collaborator could not take the finished log.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("failed to write response log: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode response log: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("submission rejected: {0}")]
    Rejected(String),
}
