use clap::Parser;
use std::path::PathBuf;

struct DefaultArgs;

impl DefaultArgs {
    pub const DIR: &'static str = ".";
}

/// Find undocumented public declarations and politely ask their authors to document them.
#[derive(Clone, Parser)]
#[command(name = "docnag")]
#[command(
    about = "Mail the authors of undocumented public declarations; use --dry-run to only list them."
)]
pub struct Cli {
    /// Directory to walk (and to read .docnag.toml / .env from). Default: current directory.
    #[arg(long, short = 'd', value_name = "DIR", default_value = DefaultArgs::DIR)]
    pub dir: PathBuf,

    /// Scan only these files instead of walking DIR.
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Log the messages instead of sending them.
    #[arg(long)]
    pub dry_run: bool,

    /// Verbose output.
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// File extensions to scan. Can specify multiple: -x php java
    #[arg(long = "ext", short = 'x', num_args = 1..)]
    pub extensions: Vec<String>,

    /// Exclude patterns (glob syntax). Can specify multiple: -e pattern1 pattern2 pattern3
    #[arg(long, short = 'e', num_args = 1..)]
    pub exclude: Vec<String>,

    /// Follow symbolic links.
    #[arg(long, short = 'f')]
    pub follow_links: bool,

    /// Strict mode: fail on walk errors and exit non-zero if any task failed.
    #[arg(long)]
    pub strict: bool,

    /// Discovery (scan) workers.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub discovery_workers: Option<usize>,

    /// Enrichment (git blame) workers. Default: available threads, capped by the FD limit.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub enrichment_workers: Option<usize>,

    /// Dispatch (mail) workers.
    #[arg(long, value_parser = clap::value_parser!(usize))]
    pub dispatch_workers: Option<usize>,

    /// Give up if a stage does not drain within this many seconds.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub drain_timeout: Option<u64>,

    /// SMTP host.
    #[arg(long)]
    pub smtp_host: Option<String>,

    /// SMTP port. Without it, 25 is tried first, then 1025.
    #[arg(long, value_parser = clap::value_parser!(u16))]
    pub smtp_port: Option<u16>,

    /// SMTP user. Password comes from DOCNAG_SMTP_PASSWORD, .env, or a prompt.
    #[arg(long)]
    pub smtp_user: Option<String>,

    /// From address.
    #[arg(long)]
    pub sender: Option<String>,

    /// Subject line.
    #[arg(long)]
    pub subject: Option<String>,

    /// Base URL for links to the file, e.g. https://git.example.com/repo/blob/main
    #[arg(long)]
    pub browse_url: Option<String>,
}
