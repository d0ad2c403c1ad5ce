//! Docnag: finds undocumented public declarations, blames their authors and asks them to
//! document. Built on a three-stage worker pipeline with explicit drain tracking.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use error::{DispatchError, DrainTimeoutError, LookupError, PipelineError};
pub use pipeline::{CancelToken, PipelineDriver};

use log::debug;
use std::path::Path;

use engine::{DeclarationScanner, GitBlame, Notify};
use pipeline::{Collaborators, WalkContext};

/// Result alias used by public docnag API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Single entry point: walk `root`, scan every matching file, blame each undocumented
/// declaration and hand it to `notifier`. Returns once every stage has drained.
///
/// - **`cancel: None`** → the run cannot be interrupted.
/// - **`cancel: Some(token)`** → after `token.cancel()`, queued tasks are drained without being processed.
///
/// `notifier` is released exactly once before this returns, whether the run succeeded or not.
pub fn nag_dir<N>(
    root: &Path,
    opts: &NagOpts,
    notifier: N,
    cancel: Option<CancelToken>,
) -> Result<RunSummary>
where
    N: Notify + 'static,
{
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    let collaborators = Collaborators::new(DeclarationScanner, GitBlame::default());
    let mut driver = PipelineDriver::new(collaborators, notifier, opts);
    if let Some(token) = cancel {
        driver = driver.with_cancel(token);
    }
    let ctx = WalkContext::new(
        root,
        &opts.extensions,
        &opts.exclude,
        opts.follow_links,
        opts.strict,
    );
    driver.run(|| pipeline::enumerate_files(&ctx))
}
