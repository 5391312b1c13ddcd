//! Path resolution for pgconverge
//!
//! # Environment Variables
//!
//! - `PGCONVERGE_MANIFEST` - Manifest file (also settable with `--manifest`)
//! - `PGCONVERGE_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `state_dir` from the manifest settings
//! 2. `PGCONVERGE_STATE_DIR` environment variable
//! 3. `XDG_STATE_HOME/pgconverge` (if set)
//! 4. Platform default:
//!    - Windows: `%LOCALAPPDATA%\pgconverge`
//!    - macOS/Linux: `~/.local/state/pgconverge`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for the manifest path
pub const ENV_MANIFEST: &str = "PGCONVERGE_MANIFEST";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "PGCONVERGE_STATE_DIR";

/// Manifest used when neither flag nor env var names one
pub const DEFAULT_MANIFEST: &str = "pgconverge.toml";

const APP_DIR: &str = "pgconverge";

/// Get the pgconverge state directory path
pub fn state_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let path = expand(dir);
        log::debug!("Using state dir from manifest: {}", path.display());
        return Ok(path);
    }

    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join(APP_DIR);
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
