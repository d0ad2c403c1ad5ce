//! SMTP credentials: env var → .env in dir → secure prompt.

use anyhow::{Context, Result};
use colored::Colorize;
use log::info;
use std::path::Path;

use crate::utils::config::PackagePaths;

fn user_key() -> String {
    PackagePaths::get().env_key("SMTP_USER")
}

fn password_key() -> String {
    PackagePaths::get().env_key("SMTP_PASSWORD")
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn try_env_then_dotenv(dir: &Path, key: &str) -> Option<String> {
    if let Some(s) = non_empty_env(key) {
        return Some(s);
    }
    let env_path = dir.join(".env");
    if env_path.is_file() {
        let _ = dotenvy::from_path(&env_path);
        return non_empty_env(key);
    }
    None
}

/// Resolve `(user, password)`. No user anywhere → `Ok(None)` (unauthenticated relay).
/// With a user but no password in env/.env, prompt for it.
pub fn get_smtp_credentials(dir: &Path, user: Option<&str>) -> Result<Option<(String, String)>> {
    let user = match user.map(str::to_string).or_else(|| try_env_then_dotenv(dir, &user_key())) {
        Some(u) => u,
        None => return Ok(None),
    };
    if let Some(p) = try_env_then_dotenv(dir, &password_key()) {
        info!("SMTP password found in environment");
        return Ok(Some((user, p)));
    }
    let label = format!("[{}]", env!("CARGO_PKG_NAME")).cyan().bold();
    let pass = rpassword::prompt_password(format!("{} SMTP password for {}: ", label, user))
        .context("read SMTP password")?;
    Ok(Some((user, pass.trim().to_string())))
}
