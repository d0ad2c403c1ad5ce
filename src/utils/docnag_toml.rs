//! Load `.docnag.toml` from a directory (CLI only). Lib callers pass [`NagOpts`](crate::NagOpts) directly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DocnagToml {
    #[serde(default)]
    settings: SettingsSection,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsSection {
    extensions: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    follow_links: Option<bool>,
    strict: Option<bool>,
    verbose: Option<bool>,
    discovery_workers: Option<usize>,
    enrichment_workers: Option<usize>,
    dispatch_workers: Option<usize>,
    drain_timeout_secs: Option<u64>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    smtp_user: Option<String>,
    sender: Option<String>,
    subject: Option<String>,
    signature: Option<String>,
    browse_url: Option<String>,
}

/// Path of the config file inside `dir`.
pub(crate) fn config_path(dir: &Path) -> PathBuf {
    dir.join(PackagePaths::get().config_filename())
}

/// Load `.docnag.toml` from `dir`. `Ok(None)` when there is no such file; an unreadable or
/// invalid file is an error for the caller to report once logging is up.
pub(crate) fn load_docnag_toml(dir: &Path) -> Result<Option<DocnagToml>> {
    let path = config_path(dir);
    let s = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    parse_docnag_toml(&s)
        .map(Some)
        .with_context(|| format!("parse {}", path.display()))
}

pub(crate) fn parse_docnag_toml(s: &str) -> Result<DocnagToml, toml::de::Error> {
    toml::from_str(s)
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $($opts_field:ident).+) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $opts.$($opts_field).+ = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
/// dry_run and explicit files are never read from the file.
pub(crate) fn apply_file_to_opts(file: &DocnagToml, opts: &mut Opts) {
    let sec = &file.settings;
    apply_file_opt!(sec, opts, extensions => extensions);
    apply_file_opt!(sec, opts, exclude => exclude);
    apply_file_opt!(sec, opts, follow_links => follow_links);
    apply_file_opt!(sec, opts, strict => strict);
    apply_file_opt!(sec, opts, verbose => verbose);
    apply_file_opt!(sec, opts, discovery_workers => workers.discovery);
    apply_file_opt!(sec, opts, enrichment_workers => workers.enrichment);
    apply_file_opt!(sec, opts, dispatch_workers => workers.dispatch);
    apply_file_opt!(sec, opts, smtp_host => smtp_host);
    apply_file_opt!(sec, opts, smtp_port => smtp_port);
    apply_file_opt!(sec, opts, sender => sender);
    apply_file_opt!(sec, opts, subject => subject);
    apply_file_opt!(sec, opts, signature => signature);
    if let Some(secs) = sec.drain_timeout_secs {
        opts.drain_timeout = Some(Duration::from_secs(secs));
    }
    if sec.smtp_port.is_some() {
        // an explicit port means no guessing
        opts.smtp_fallback_port = None;
    }
    if let Some(ref user) = sec.smtp_user {
        opts.smtp_user = Some(user.clone());
    }
    if let Some(ref url) = sec.browse_url {
        opts.browse_url = Some(url.clone());
    }
}
