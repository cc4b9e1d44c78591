//! Typed error hierarchy for the textcraft engine.
//!
//! Four enums cover the subsystems that touch disk or drive the loop:
//! - `MatrixError`: reading and atomically replacing `matrix.json`
//! - `ControlError`: reading and rewriting `control.json`
//! - `ScanError`: status inference over the manuscripts directory
//! - `OrchestratorError`: failures escaping a cycle, and the fatal stop

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading or persisting the Matrix document.
#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("Failed to read matrix at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Matrix at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize matrix: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to write matrix at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the file-backed control channel.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("Failed to read control document at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Control document at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize control document: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to write control document at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to lock control document via {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Control state lock poisoned")]
    LockPoisoned,
}

/// Errors that abort a whole scan. Per-file problems never surface here.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to list manuscripts in {path}: {source}")]
    ManuscriptsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Matrix(#[from] MatrixError),
}

/// Errors from the orchestration loop.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Control(#[from] ControlError),

    #[error("Stopped after {count} consecutive cycle failures (last: {last_error})")]
    ConsecutiveFailures { count: u32, last_error: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
