//! Error types for docnag: per-task failures and the optional drain bound.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Authorship resolution failed for one line.
#[derive(Debug, Error)]
#[error("lookup failed for {}:{line}: {reason}", .file.display())]
pub struct LookupError {
    pub file: PathBuf,
    pub line: usize,
    pub reason: String,
}

/// Notification send failed for one line.
#[derive(Debug, Error)]
#[error("dispatch to {identity} failed for {}:{line}: {reason}", .file.display())]
pub struct DispatchError {
    pub identity: String,
    pub file: PathBuf,
    pub line: usize,
    pub reason: String,
}

/// A drain wait exceeded its bound (a stuck external call, most likely).
#[derive(Debug, Error)]
#[error("{queue} queue did not drain within {waited:?} ({pending} items still pending)")]
pub struct DrainTimeoutError {
    pub queue: &'static str,
    pub pending: usize,
    pub waited: Duration,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("scan failed for {}: {source}", .file.display())]
    Scan {
        file: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    DrainTimeout(#[from] DrainTimeoutError),

    /// The task reached a resource that was already released; counted as skipped.
    #[error("{0} already released")]
    Released(&'static str),
}
