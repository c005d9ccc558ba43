//! Configuration discovery

use std::path::{Path, PathBuf};

use eyre::WrapErr;
use qcinv_inventory::Config;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "QCINV_CONFIG";

/// Load configuration from `explicit`, `$QCINV_CONFIG` or the default paths
///
/// # Errors
/// Returns error if no file is found or the file cannot be read or parsed
pub fn load(explicit: Option<&Path>) -> eyre::Result<Config> {
    if let Some(path) = explicit {
        return load_from(path);
    }

    // Check environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return load_from(Path::new(&path));
    }

    let paths = default_paths();
    for path in &paths {
        if path.exists() {
            return load_from(path);
        }
    }

    let tried: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    eyre::bail!(
        "no config file found; pass --config, set {CONFIG_ENV}, or create one of: {}",
        tried.join(", ")
    )
}

fn load_from(path: &Path) -> eyre::Result<Config> {
    tracing::debug!(path = %path.display(), "loading config");
    Config::load(path).wrap_err_with(|| format!("failed to load config {}", path.display()))
}

/// Paths searched when no file is named explicitly
fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("qcinv.toml"),
        PathBuf::from("/etc/qcinv/qcinv.toml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("qcinv/qcinv.toml"));
    }
    paths
}
