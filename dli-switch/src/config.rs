//! Load connection defaults from file and environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Connection defaults. File: ~/.config/dli-switch/config.toml or /etc/dli-switch/config.toml.
/// Env overrides: DLI_SWITCH_USER, DLI_SWITCH_PASSWORD, DLI_SWITCH_TIMEOUT, DLI_SWITCH_ATTEMPTS.
/// Command-line options override both.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Switch login (default "admin").
    #[serde(default = "default_user")]
    pub user: String,
    /// Switch password (default "1234").
    #[serde(default = "default_password")]
    pub password: String,
    /// Seconds to wait for any single request (default 3).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per request before aborting the run (default 3).
    #[serde(default = "default_attempts")]
    pub attempts: u32,
}

fn default_user() -> String {
    "admin".to_string()
}
fn default_password() -> String {
    "1234".to_string()
}
fn default_timeout_secs() -> u64 {
    3
}
fn default_attempts() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: default_user(),
            password: default_password(),
            timeout_secs: default_timeout_secs(),
            attempts: default_attempts(),
        }
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file(&config_paths()).unwrap_or_default();
    apply_env(&mut c, |key| std::env::var(key).ok());
    c
}

fn apply_env(c: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(s) = var("DLI_SWITCH_USER") {
        c.user = s;
    }
    if let Some(s) = var("DLI_SWITCH_PASSWORD") {
        c.password = s;
    }
    if let Some(s) = var("DLI_SWITCH_TIMEOUT") {
        if let Ok(t) = s.parse::<u64>() {
            c.timeout_secs = t;
        }
    }
    if let Some(s) = var("DLI_SWITCH_ATTEMPTS") {
        if let Ok(n) = s.parse::<u32>() {
            c.attempts = n;
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut out = Vec::new();
    if let Some(h) = home {
        out.push(h.join(".config/dli-switch/config.toml"));
    }
    out.push(PathBuf::from("/etc/dli-switch/config.toml"));
    out
}

/// First existing file wins; a broken file is reported and ignored.
fn load_file(paths: &[PathBuf]) -> Option<Config> {
    let path = paths.iter().find(|p| p.exists())?;
    match read_file(path) {
        Ok(c) => {
            tracing::debug!(path = %path.display(), "loaded config");
            Some(c)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            None
        }
    }
}

fn read_file(path: &Path) -> anyhow::Result<Config> {
    let s = std::fs::read_to_string(path)?;
    Ok(toml::from_str::<Config>(&s)?)
}
