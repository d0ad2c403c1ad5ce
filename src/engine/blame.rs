//! Authorship lookup via `git blame --porcelain`.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::LookupError;
use crate::utils::config::AUTHOR_MAIL_PREFIX;

/// Identity git reports for lines that only exist in the working tree.
const NOT_COMMITTED: &str = "not.committed.yet";

/// Resolves who last touched a line. Blocking; called from many enrichment workers at once.
pub trait Lookup: Send + Sync {
    fn lookup(&self, file: &Path, line: usize) -> Result<String, LookupError>;
}

impl<F> Lookup for F
where
    F: Fn(&Path, usize) -> Result<String, LookupError> + Send + Sync,
{
    fn lookup(&self, file: &Path, line: usize) -> Result<String, LookupError> {
        self(file, line)
    }
}

/// Runs `git blame -p -l -L <line>,+1` in the file's directory, so git finds the enclosing repo.
#[derive(Clone, Debug)]
pub struct GitBlame {
    git: PathBuf,
}

impl Default for GitBlame {
    fn default() -> Self {
        GitBlame {
            git: PathBuf::from("git"),
        }
    }
}

impl GitBlame {
    /// Use a specific git executable instead of the one on `PATH`.
    pub fn with_git(git: impl Into<PathBuf>) -> Self {
        GitBlame { git: git.into() }
    }
}

impl Lookup for GitBlame {
    fn lookup(&self, file: &Path, line: usize) -> Result<String, LookupError> {
        let fail = |reason: String| LookupError {
            file: file.to_path_buf(),
            line,
            reason,
        };
        let name = file
            .file_name()
            .ok_or_else(|| fail("path has no file name".to_string()))?;
        let dir = match file.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        log::debug!("blaming {}:{}", file.display(), line);
        let output = Command::new(&self.git)
            .current_dir(dir)
            .arg("blame")
            .arg("-p") // porcelain
            .arg("-l") // long revision
            .arg("-L")
            .arg(format!("{line},+1"))
            .arg("--")
            .arg(name)
            .output()
            .map_err(|e| fail(format!("run {}: {}", self.git.display(), e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "git blame exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_author_mail(&stdout) {
            Some(NOT_COMMITTED) => Err(fail("line is not committed yet".to_string())),
            Some(mail) => Ok(mail.to_string()),
            None => Err(fail("no author-mail in git blame output".to_string())),
        }
    }
}

/// First `author-mail <addr>` header in porcelain output, without the angle brackets.
pub fn parse_author_mail(porcelain: &str) -> Option<&str> {
    porcelain.lines().find_map(|l| {
        l.strip_prefix(AUTHOR_MAIL_PREFIX)?
            .strip_prefix('<')?
            .strip_suffix('>')
            .filter(|m| !m.is_empty())
    })
}
