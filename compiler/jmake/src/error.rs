//! Error types.
//!
//! Only [`OrchestratorError`] escapes [`crate::Orchestrator::compile`];
//! everything else is turned into context messages, recompile-set entries or
//! a rebuild request.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to start the external compiler.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("failed to start compiler process: {0}")]
    Io(#[from] io::Error),
    #[error("compiler launch denied: {0}")]
    Security(String),
    #[error("invalid compiler argument: {0}")]
    IllegalArgument(String),
    /// The backend could not build a command line, e.g. an unsupported JDK.
    #[error("{0}")]
    InvalidCommandLine(String),
}

/// Errors reported by the dependency cache.
///
/// `Clone` so a recorded failure can be handed to every later producer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// One class file could not be read; other classes are unaffected.
    #[error("malformed class file {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
    /// The cache's own storage is inconsistent; only a full rebuild helps.
    #[error("dependency cache corrupted: {0}")]
    Corrupted(String),
    #[error("dependency cache I/O error: {0}")]
    Io(String),
}

impl CacheError {
    /// Whether this error invalidates the cache until a full rebuild.
    #[inline]
    pub fn is_corruption(&self) -> bool {
        matches!(self, CacheError::Corrupted(_))
    }
}

/// Fatal failure of one orchestration call.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("cannot run compiler '{backend}': {source}")]
    Launch {
        backend: String,
        #[source]
        source: LaunchError,
    },
    #[error("failed to create staging directory: {0}")]
    Staging(#[source] io::Error),
}

/// Failure recorded by a stream-parser or class-parser thread.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("{0} thread panicked")]
    Panicked(String),
}

impl WorkerError {
    pub fn is_corruption(&self) -> bool {
        matches!(self, WorkerError::Cache(e) if e.is_corruption())
    }
}
