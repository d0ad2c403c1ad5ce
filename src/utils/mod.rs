pub mod config;
pub mod credentials;
pub(crate) mod docnag_toml;
pub mod fd_limit;
pub mod logger;

pub use config::*;
pub use credentials::get_smtp_credentials;
pub use fd_limit::{FDS_PER_WORKER, max_open_fds, max_workers_by_fd_limit};
pub use logger::setup_logging;
