//! CLI command handler: mail by default; --dry-run logs the messages instead.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;
use std::time::Duration;

use crate::Opts;
use crate::engine::arg_parser::Cli;
use crate::engine::blame::GitBlame;
use crate::engine::message::MessageTemplate;
use crate::engine::notify::{DryRunNotifier, Notify, SmtpNotifier, SmtpSettings};
use crate::engine::scan::DeclarationScanner;
use crate::pipeline::{
    CancelToken, Collaborators, PipelineDriver, WalkContext, check_for_task_failures,
    enumerate_files, enumerate_given,
};
use crate::types::{FileTask, NagOpts, RunSummary};
use crate::utils::docnag_toml::{apply_file_to_opts, load_docnag_toml};
use crate::utils::{get_smtp_credentials, setup_logging};

/// Defaults < .docnag.toml in DIR < CLI flags.
/// A bad config file is skipped and handed back, to be logged once logging is set up.
pub fn setup_opts(cli: &Cli) -> (Opts, Option<anyhow::Error>) {
    let mut opts = Opts::default();
    let config_error = match load_docnag_toml(&cli.dir) {
        Ok(Some(file)) => {
            apply_file_to_opts(&file, &mut opts);
            None
        }
        Ok(None) => None,
        Err(e) => Some(e),
    };
    apply_cli_to_opts(cli, &mut opts);
    (opts, config_error)
}

fn apply_cli_to_opts(cli: &Cli, opts: &mut Opts) {
    // flags can only switch these on; the config file may already have
    opts.verbose |= cli.verbose;
    opts.follow_links |= cli.follow_links;
    opts.strict |= cli.strict;
    if !cli.extensions.is_empty() {
        opts.extensions = cli.extensions.clone();
    }
    opts.exclude.extend(cli.exclude.iter().cloned());
    if let Some(n) = cli.discovery_workers {
        opts.workers.discovery = n;
    }
    if let Some(n) = cli.enrichment_workers {
        opts.workers.enrichment = n;
    }
    if let Some(n) = cli.dispatch_workers {
        opts.workers.dispatch = n;
    }
    if let Some(secs) = cli.drain_timeout {
        opts.drain_timeout = Some(Duration::from_secs(secs));
    }
    if let Some(ref h) = cli.smtp_host {
        opts.smtp_host = h.clone();
    }
    if let Some(p) = cli.smtp_port {
        opts.smtp_port = p;
        opts.smtp_fallback_port = None;
    }
    if cli.smtp_user.is_some() {
        opts.smtp_user = cli.smtp_user.clone();
    }
    if let Some(ref s) = cli.sender {
        opts.sender = s.clone();
    }
    if let Some(ref s) = cli.subject {
        opts.subject = s.clone();
    }
    if cli.browse_url.is_some() {
        opts.browse_url = cli.browse_url.clone();
    }
    opts.files = cli.files.clone();
    opts.dry_run = cli.dry_run;
}

/// Run from parsed CLI args: set up logging, acquire the mail channel, run, report.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let (opts, config_error) = setup_opts(cli);
    setup_logging(opts.verbose);
    if let Some(e) = config_error {
        warn!("Ignoring config file: {:#}", e);
    }
    debug!("{} CONFIG: {:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || handler_token.cancel()).context("set Ctrl+C handler")?;

    let template = MessageTemplate::from(&opts).with_root(&cli.dir);
    let summary = if opts.dry_run {
        warn!("RUNNING IN DRY-RUN MODE. NO MAIL WILL BE SENT.");
        run_with(&cli.dir, &opts, DryRunNotifier::new(template), cancel)?
    } else {
        let settings = SmtpSettings {
            host: opts.smtp_host.clone(),
            port: opts.smtp_port,
            fallback_port: opts.smtp_fallback_port,
            credentials: get_smtp_credentials(&cli.dir, opts.smtp_user.as_deref())?,
        };
        let notifier = SmtpNotifier::connect(&settings, template)?;
        run_with(&cli.dir, &opts, notifier, cancel)?
    };

    report(&summary);
    check_for_task_failures(opts.strict, opts.verbose, &summary)?;
    if summary.cancelled {
        anyhow::bail!("Run cancelled by user");
    }
    Ok(())
}

fn run_with<N: Notify + 'static>(
    dir: &Path,
    opts: &Opts,
    notifier: N,
    cancel: CancelToken,
) -> Result<RunSummary> {
    let collaborators = Collaborators::new(DeclarationScanner, GitBlame::default());
    let driver =
        PipelineDriver::new(collaborators, notifier, &NagOpts::from(opts)).with_cancel(cancel);
    driver.run(|| enumerate(dir, opts))
}

fn enumerate(dir: &Path, opts: &Opts) -> Result<Vec<FileTask>> {
    if !opts.files.is_empty() {
        return enumerate_given(&opts.files);
    }
    let ctx = WalkContext::new(
        dir,
        &opts.extensions,
        &opts.exclude,
        opts.follow_links,
        opts.strict,
    );
    enumerate_files(&ctx)
}

fn report(summary: &RunSummary) {
    info!(
        "{} files scanned, {} undocumented declarations, {} authors resolved, {} notified ({} failed)",
        summary.files,
        summary.line_tasks,
        summary.annotated,
        summary.notified,
        summary.failures.len()
    );
}
