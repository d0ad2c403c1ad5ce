//! Public and internal types for the docnag API and pipeline.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::config::{DefaultSettings, WorkerThreadLimits};

/// A source file to scan. Created by the enumerator, consumed once by a discovery worker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FileTask {
    pub path: PathBuf,
}

/// One undocumented declaration: file plus 1-based line number.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LineTask {
    pub path: PathBuf,
    pub line: usize,
}

/// A [`LineTask`] with the identity (author mail) that last touched the line.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnnotatedTask {
    pub path: PathBuf,
    pub line: usize,
    pub identity: String,
}

impl From<PathBuf> for FileTask {
    fn from(path: PathBuf) -> Self {
        FileTask { path }
    }
}

impl LineTask {
    pub fn annotate(self, identity: String) -> AnnotatedTask {
        AnnotatedTask {
            path: self.path,
            line: self.line,
            identity,
        }
    }
}

impl fmt::Display for FileTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

impl fmt::Display for LineTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

impl fmt::Display for AnnotatedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.path.display(), self.line, self.identity)
    }
}

/// Per-stage counters reported by a worker pool when it stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageStats {
    /// Items whose transform returned Ok.
    pub completed: usize,
    /// Items whose transform returned Err or panicked.
    pub failed: usize,
    /// Items drained without processing after cancellation.
    pub skipped: usize,
}

impl StageStats {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.skipped
    }
}

/// A task dropped by a worker after its transform failed.
#[derive(Clone, Debug)]
pub struct TaskFailure {
    pub stage: &'static str,
    pub task: String,
    pub error: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.task, self.error)
    }
}

/// Outcome of one full pipeline run.
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    /// FileTasks seeded into discovery.
    pub files: usize,
    /// LineTasks produced by discovery.
    pub line_tasks: usize,
    /// AnnotatedTasks produced by enrichment.
    pub annotated: usize,
    /// Notifications actually sent (or logged, in dry-run).
    pub notified: usize,
    pub discovery: StageStats,
    pub enrichment: StageStats,
    pub dispatch: StageStats,
    pub failures: Vec<TaskFailure>,
    pub cancelled: bool,
}

/// Worker counts for the three stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageWorkers {
    pub discovery: usize,
    pub enrichment: usize,
    pub dispatch: usize,
}

impl Default for StageWorkers {
    fn default() -> Self {
        StageWorkers {
            discovery: WorkerThreadLimits::DISCOVERY_THREADS,
            enrichment: WorkerThreadLimits::current().enrichment_threads(),
            dispatch: WorkerThreadLimits::DISPATCH_THREADS,
        }
    }
}

impl StageWorkers {
    /// Same worker count in every stage (handy in tests).
    pub fn uniform(n: usize) -> Self {
        StageWorkers {
            discovery: n,
            enrichment: n,
            dispatch: n,
        }
    }
}

/// Lib-only options for [`nag_dir`](crate::nag_dir): walk, workers and drain bound.
#[derive(Clone, Debug)]
pub struct NagOpts {
    /// Worker counts per stage.
    pub workers: StageWorkers,
    /// File extensions to scan (without the dot).
    pub extensions: Vec<String>,
    /// Exclude patterns (glob syntax, e.g. `vendor`, `*.min.php`).
    pub exclude: Vec<String>,
    /// Follow symbolic links.
    pub follow_links: bool,
    /// Strict mode: fail on walk errors and on any task failure.
    pub strict: bool,
    /// Upper bound for each drain wait. None waits forever.
    pub drain_timeout: Option<Duration>,
}

impl Default for NagOpts {
    fn default() -> Self {
        NagOpts {
            workers: StageWorkers::default(),
            extensions: DefaultSettings::extensions(),
            exclude: Vec::new(),
            follow_links: false,
            strict: false,
            drain_timeout: None,
        }
    }
}

impl From<&Opts> for NagOpts {
    fn from(o: &Opts) -> Self {
        NagOpts {
            workers: o.workers,
            extensions: o.extensions.clone(),
            exclude: o.exclude.clone(),
            follow_links: o.follow_links,
            strict: o.strict,
            drain_timeout: o.drain_timeout,
        }
    }
}

/// Full options (CLI). Use [`NagOpts`] for lib.
#[derive(Clone, Debug)]
pub struct Opts {
    pub workers: StageWorkers,
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub follow_links: bool,
    pub strict: bool,
    pub drain_timeout: Option<Duration>,
    /// Explicit files to scan instead of walking the directory.
    pub files: Vec<PathBuf>,
    /// Log notifications instead of sending them.
    pub dry_run: bool,
    pub verbose: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Port tried when the first connection fails.
    pub smtp_fallback_port: Option<u16>,
    pub smtp_user: Option<String>,
    /// Mail From address.
    pub sender: String,
    pub subject: String,
    pub signature: String,
    /// Base URL for a "browse the file" link, e.g. `https://git.example.com/repo/blob/main`.
    pub browse_url: Option<String>,
}

impl Default for Opts {
    fn default() -> Self {
        Opts {
            workers: StageWorkers::default(),
            extensions: DefaultSettings::extensions(),
            exclude: Vec::new(),
            follow_links: false,
            strict: false,
            drain_timeout: None,
            files: Vec::new(),
            dry_run: false,
            verbose: false,
            smtp_host: DefaultSettings::SMTP_HOST.to_string(),
            smtp_port: DefaultSettings::SMTP_PORT,
            smtp_fallback_port: Some(DefaultSettings::SMTP_FALLBACK_PORT),
            smtp_user: None,
            sender: DefaultSettings::sender(),
            subject: DefaultSettings::SUBJECT.to_string(),
            signature: DefaultSettings::signature(),
            browse_url: None,
        }
    }
}
