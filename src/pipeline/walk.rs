//! Enumerates candidate source files: consumes walk outcomes, filters, handles strict/skipped.

use anyhow::{Result, bail};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::engine::tools::{is_excluded, should_include_in_walk};
use crate::types::FileTask;
use crate::utils::config::PackagePaths;

/// One result from a directory walk: either a path to consider or an error with optional path.
pub enum WalkOutcome {
    Ok(PathBuf),
    Err { msg: String, path: Option<PathBuf> },
}

/// Convert a walkdir result into [`WalkOutcome`]. Directories are dropped here.
pub fn to_outcome_walkdir(r: Result<walkdir::DirEntry, walkdir::Error>) -> Option<WalkOutcome> {
    match r {
        Ok(entry) if entry.file_type().is_dir() => None,
        Ok(entry) => Some(WalkOutcome::Ok(entry.into_path())),
        Err(err) => Some(WalkOutcome::Err {
            msg: format!("{}", err),
            path: err.path().map(PathBuf::from),
        }),
    }
}

/// Settings for one enumeration.
pub struct WalkContext {
    pub root: PathBuf,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub follow_links: bool,
    pub strict: bool,
}

impl WalkContext {
    /// Exclude list gets the package defaults (VCS dirs) prepended.
    pub fn new(
        root: &Path,
        extensions: &[String],
        exclude: &[String],
        follow_links: bool,
        strict: bool,
    ) -> Self {
        let mut all_exclude = PackagePaths::get().default_exclude_patterns();
        all_exclude.extend(exclude.iter().cloned());
        WalkContext {
            root: root.to_path_buf(),
            extensions: extensions.to_vec(),
            exclude: all_exclude,
            follow_links,
            strict,
        }
    }
}

/// Walk `ctx.root` and return every file to scan, in walk order.
pub fn enumerate_files(ctx: &WalkContext) -> Result<Vec<FileTask>> {
    let exclude = ctx.exclude.clone();
    let root = ctx.root.clone();
    let iter = WalkDir::new(&ctx.root)
        .follow_links(ctx.follow_links)
        .sort_by_file_name()
        .into_iter()
        // prune excluded directories instead of walking into them
        .filter_entry(move |e| e.path() == root || !is_excluded(e.path(), &exclude))
        .filter_map(to_outcome_walkdir);
    run_walk_loop(ctx, iter)
}

/// Consume `iter` of [`WalkOutcome`], keep paths accepted by `should_include_in_walk`.
/// Errors: strict → fail on the first one; otherwise log and skip.
pub fn run_walk_loop<I>(ctx: &WalkContext, iter: I) -> Result<Vec<FileTask>>
where
    I: Iterator<Item = WalkOutcome>,
{
    let mut files = Vec::new();
    let mut skipped: Vec<(PathBuf, String)> = Vec::new();
    for outcome in iter {
        match outcome {
            WalkOutcome::Ok(path) => {
                if should_include_in_walk(&path, &ctx.root, &ctx.extensions, &ctx.exclude) {
                    files.push(FileTask::from(path));
                }
            }
            WalkOutcome::Err { msg, path } => {
                if ctx.strict {
                    bail!("walk {}: {}", ctx.root.display(), msg);
                }
                let to_push = path.unwrap_or_else(|| PathBuf::from("<no-path>"));
                skipped.push((to_push, msg));
            }
        }
    }
    if !skipped.is_empty() {
        warn!(
            "Skipped {} paths due to permission errors or access issues",
            skipped.len()
        );
        for (p, msg) in &skipped {
            debug!("  skipped: {} ({})", p.display(), msg);
        }
    }
    debug!("walk: {} files to scan under {}", files.len(), ctx.root.display());
    Ok(files)
}

/// Explicit file list (CLI arguments): each must be an existing file.
pub fn enumerate_given(files: &[PathBuf]) -> Result<Vec<FileTask>> {
    files
        .iter()
        .map(|f| {
            if !f.is_file() {
                bail!("not a file: {}", f.display());
            }
            Ok(FileTask::from(f.clone()))
        })
        .collect()
}
