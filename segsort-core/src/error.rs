use std::{io, path::PathBuf};

use thiserror::Error;

/// Result alias used throughout the segmentation pipeline and triage session.
pub type Result<T, E = TriageError> = std::result::Result<T, E>;

/// Failures surfaced by the pipeline, the file router, and the triage session.
///
/// Only [`TriageError::ModelLoad`] is fatal for a frontend; every other variant leaves the
/// session where it was so the operator can retry, skip, or quit.
#[derive(Debug, Error)]
pub enum TriageError {
    #[error("failed to decode image {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("failed to encode image {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("failed to load segmentation model: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("refusing to overwrite preserved original {}", path.display())]
    CopyConflict { path: PathBuf },

    #[error("failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("directory {}: {reason}", path.display())]
    Directory { path: PathBuf, reason: String },

    #[error("no file left to triage")]
    SessionFinished,

    #[error("{} has no segmentation result yet; retry or skip it", path.display())]
    NotReady { path: PathBuf },
}

impl TriageError {
    /// `true` for errors after which the process cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TriageError::ModelLoad(_))
    }
}
