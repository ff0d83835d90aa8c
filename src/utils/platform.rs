//! Platform-specific locations
//!
//! - Config: `./config.toml`, then the per-user config directory
//!   (`~/.config/nicoloader/config.toml` on Linux,
//!   `~/Library/Application Support/nicoloader/config.toml` on macOS,
//!   `%APPDATA%\nicoloader\config.toml` on Windows)

use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Per-user configuration directory
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nicoloader")
}

/// Pick the config file to load.
///
/// An explicit path always wins. Otherwise `./config.toml` is used when it
/// exists, falling back to the per-user location.
pub fn resolve_config_path(explicit: Option<&Path>, working_dir: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let local = working_dir.join(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }

    let user = config_dir().join(CONFIG_FILE_NAME);
    if user.exists() {
        user
    } else {
        local
    }
}
