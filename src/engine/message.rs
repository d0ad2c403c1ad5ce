//! Mail templating for documentation requests.

use std::path::{Path, PathBuf};

use crate::Opts;
use crate::engine::tools::{path_relative_to, path_to_url_path};

/// Static parts of every message.
#[derive(Clone, Debug)]
pub struct MessageTemplate {
    pub sender: String,
    pub subject: String,
    pub signature: String,
    /// Link base; the file path relative to `root` is appended.
    pub browse_url: Option<String>,
    /// Scanned directory. Paths under it are shown relative to it.
    pub root: Option<PathBuf>,
}

impl From<&Opts> for MessageTemplate {
    fn from(o: &Opts) -> Self {
        MessageTemplate {
            sender: o.sender.clone(),
            subject: o.subject.clone(),
            signature: o.signature.clone(),
            browse_url: o.browse_url.clone(),
            root: None,
        }
    }
}

/// Greeting name: the local part of the address.
pub fn recipient_name(identity: &str) -> &str {
    identity.split('@').next().unwrap_or(identity)
}

impl MessageTemplate {
    pub fn with_root(mut self, root: &Path) -> Self {
        self.root = Some(root.to_path_buf());
        self
    }

    /// `file` as shown in the message and link: relative to the root when under it.
    pub fn display_path(&self, file: &Path) -> String {
        let rel = self
            .root
            .as_deref()
            .and_then(|root| path_relative_to(file, root));
        path_to_url_path(rel.as_deref().unwrap_or(file))
    }

    pub fn body(&self, identity: &str, file: &Path, line: usize) -> String {
        let file_str = self.display_path(file);
        let link = self
            .browse_url
            .as_deref()
            .map(|base| format!(" (see: {}/{}#L{})", base.trim_end_matches('/'), file_str, line))
            .unwrap_or_default();
        format!(
            "Hi {name},\n\n\
             You are receiving this email because the function declared in {file_str}, \
             line number {line}, needs documentation.{link}\n\n\
             Documented code lets everyone who reads it make better decisions, faster. \
             A short doc comment above the declaration is all it takes.\n\n\
             Sincerely,\n\
             {signature}\n",
            name = recipient_name(identity),
            signature = self.signature,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(browse_url: Option<&str>) -> MessageTemplate {
        MessageTemplate {
            sender: "docs@example.com".to_string(),
            subject: "Please document your code".to_string(),
            signature: "The Docs Team".to_string(),
            browse_url: browse_url.map(String::from),
            root: None,
        }
    }

    #[test]
    fn test_recipient_name() {
        assert_eq!(recipient_name("alice@example.com"), "alice");
        assert_eq!(recipient_name("bob"), "bob");
    }

    #[test]
    fn test_body_mentions_file_line_and_name() {
        let body = template(None).body("alice@example.com", Path::new("./src/a.php"), 12);
        assert!(body.starts_with("Hi alice,"));
        assert!(body.contains("src/a.php, line number 12"));
        assert!(!body.contains("see:"));
        assert!(body.trim_end().ends_with("The Docs Team"));
    }

    #[test]
    fn test_body_with_browse_link() {
        let body = template(Some("https://git.example.com/repo/blob/main/"))
            .body("alice@example.com", Path::new("src/a.php"), 7);
        assert!(body.contains("(see: https://git.example.com/repo/blob/main/src/a.php#L7)"));
    }

    #[test]
    fn test_link_is_relative_to_absolute_root() {
        let body = template(Some("https://git.example.com/repo/blob/main"))
            .with_root(Path::new("/srv/repo"))
            .body("alice@example.com", Path::new("/srv/repo/src/a.php"), 7);
        assert!(body.contains("(see: https://git.example.com/repo/blob/main/src/a.php#L7)"));
        assert!(body.contains("declared in src/a.php,"));
        assert!(!body.contains("//srv"));
    }

    #[test]
    fn test_display_path_dot_root_and_outside_root() {
        let t = template(None).with_root(Path::new("."));
        assert_eq!(t.display_path(Path::new("./src/a.php")), "src/a.php");
        assert_eq!(t.display_path(Path::new("lib/b.php")), "lib/b.php");
        let t = template(None).with_root(Path::new("/srv/repo"));
        assert_eq!(t.display_path(Path::new("/other/c.php")), "/other/c.php");
    }
}
