//! External collaborators (scan, blame, notify) and the CLI surface.

pub mod arg_parser;
pub mod blame;
pub mod cli;
pub mod message;
pub mod notify;
pub mod scan;
pub mod tools;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use blame::{GitBlame, Lookup, parse_author_mail};
pub use cli::handle_run;
pub use message::{MessageTemplate, recipient_name};
pub use notify::{DryRunNotifier, Notify, SmtpNotifier, SmtpSettings};
pub use scan::{DeclarationScanner, Scan, find_undocumented};
pub use tools::{
    glob_match, has_extension, path_relative_to, path_to_url_path, should_include_in_walk,
};
