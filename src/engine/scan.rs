//! Finding undocumented public declarations.
//!
//! Heuristic: a line is *public* when its first whitespace token is
//! `public`, and *documented* when the line right before it, stripped, is exactly `*/`.
//! Blank lines or annotations between a doc comment and the declaration break the match.

use std::io;
use std::path::Path;

use crate::utils::config::{COMMENT_END, PUBLIC_KEYWORD};

/// Scans one file for undocumented declarations. Must be pure and callable from many threads.
pub trait Scan: Send + Sync {
    /// Returns `(line_number, raw_line)` pairs, 1-based, in file order.
    fn scan(&self, file: &Path) -> io::Result<Vec<(usize, String)>>;
}

impl<F> Scan for F
where
    F: Fn(&Path) -> io::Result<Vec<(usize, String)>> + Send + Sync,
{
    fn scan(&self, file: &Path) -> io::Result<Vec<(usize, String)>> {
        self(file)
    }
}

/// Reads the file from disk and applies [`find_undocumented`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DeclarationScanner;

impl Scan for DeclarationScanner {
    fn scan(&self, file: &Path) -> io::Result<Vec<(usize, String)>> {
        let bytes = std::fs::read(file)?;
        Ok(find_undocumented(&String::from_utf8_lossy(&bytes)))
    }
}

/// Undocumented public declarations in `text`, as `(1-based line, raw line)`.
pub fn find_undocumented(text: &str) -> Vec<(usize, String)> {
    let mut found = Vec::new();
    let mut has_comment = false;
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed == COMMENT_END {
            has_comment = true;
            continue;
        }
        if is_public_declaration(trimmed) && !has_comment {
            found.push((idx + 1, line.to_string()));
        }
        has_comment = false;
    }
    found
}

fn is_public_declaration(trimmed: &str) -> bool {
    trimmed.split_whitespace().next() == Some(PUBLIC_KEYWORD)
}
