//! Application configuration constants.
//! Defaults and worker tuning in one place.

use std::sync::OnceLock;

use crate::utils::fd_limit::max_workers_by_fd_limit;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    pkg_name: &'static str,
    config_filename: String,
    env_prefix: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                pkg_name: pkg,
                config_filename: format!(".{pkg}.toml"),
                env_prefix: pkg.to_uppercase(),
            }
        })
    }

    pub fn pkg_name(&self) -> &str {
        self.pkg_name
    }

    pub fn config_filename(&self) -> &str {
        &self.config_filename
    }

    /// Environment variable name with the package prefix, e.g. `DOCNAG_SMTP_USER`.
    pub fn env_key(&self, suffix: &str) -> String {
        format!("{}_{}", self.env_prefix, suffix)
    }

    /// Directory names excluded from the walk by default.
    pub fn default_exclude_patterns(&self) -> Vec<String> {
        vec![".git".to_string(), ".hg".to_string(), ".svn".to_string()]
    }
}

// ---- Worker threads ----

/// Thread limits per stage.
/// Use [`WorkerThreadLimits::current()`] to fill `all_threads` from the host; the rest are const.
#[derive(Clone, Copy, Debug)]
pub struct WorkerThreadLimits {
    /// Available threads; set by [`WorkerThreadLimits::current()`].
    pub all_threads: usize,
    /// Floor for any stage.
    pub floor: usize,
    /// Max enrichment threads (each one runs a `git blame` subprocess).
    pub enrichment_max: usize,
}

impl Default for WorkerThreadLimits {
    fn default() -> Self {
        Self {
            all_threads: 0, // use current() to set from the host
            floor: Self::FLOOR_THREADS,
            enrichment_max: Self::ENRICHMENT_MAX_THREADS,
        }
    }
}

impl WorkerThreadLimits {
    pub const DISCOVERY_THREADS: usize = 4;
    pub const DISPATCH_THREADS: usize = 2;
    pub const FLOOR_THREADS: usize = 1;
    pub const ENRICHMENT_MAX_THREADS: usize = 16;

    /// Build limits with `all_threads` set from the available parallelism.
    pub fn current() -> Self {
        Self {
            all_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(Self::DISCOVERY_THREADS),
            ..Self::default()
        }
    }

    /// Enrichment worker count: available threads, capped by the const max and the FD limit.
    pub fn enrichment_threads(&self) -> usize {
        let mut n = self.all_threads.min(self.enrichment_max);
        if let Some(by_fd) = max_workers_by_fd_limit() {
            n = n.min(by_fd);
        }
        n.max(self.floor)
    }
}

// ---- Defaults for CLI / config file ----

/// Built-in defaults; overridden by the config file, then by CLI flags.
pub struct DefaultSettings;

impl DefaultSettings {
    pub const EXTENSION: &'static str = "php";
    pub const SMTP_HOST: &'static str = "localhost";
    pub const SMTP_PORT: u16 = 25;
    /// Local debugging servers (e.g. `python -m smtpd`) listen here.
    pub const SMTP_FALLBACK_PORT: u16 = 1025;
    /// Connect/command timeout for the SMTP connection, in seconds.
    pub const SMTP_TIMEOUT_SECS: u64 = 30;
    pub const SUBJECT: &'static str = "Please document your code";

    pub fn extensions() -> Vec<String> {
        vec![Self::EXTENSION.to_string()]
    }

    pub fn sender() -> String {
        format!("{}@localhost", PackagePaths::get().pkg_name())
    }

    pub fn signature() -> String {
        PackagePaths::get().pkg_name().to_string()
    }
}

// ---- Scan ----

/// A declaration counts as documented when the previous line, stripped, is exactly this.
pub const COMMENT_END: &str = "*/";

/// First token that marks a declaration as public.
pub const PUBLIC_KEYWORD: &str = "public";

// ---- Blame ----

/// Porcelain header carrying the author's address, e.g. `author-mail <alice@example.com>`.
pub const AUTHOR_MAIL_PREFIX: &str = "author-mail ";
