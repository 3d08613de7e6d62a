//! Glovelight file location
//!
//! An explicit path on the command line always wins. Without one, a
//! `glovelight.yaml` in the working directory is used when present, and
//! otherwise the per-user config directory (`~/.config/glovelight` on Linux,
//! `%APPDATA%\glovelight` on Windows).

use std::path::{Path, PathBuf};
use tracing::debug;

/// File name looked up when no path is given
pub const CONFIG_FILE_NAME: &str = "glovelight.yaml";

/// Directory name used under the platform config directory
const APP_DIR: &str = "glovelight";

/// Where the Glovelight file was found, and why
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Given on the command line
    Explicit(PathBuf),
    /// Found in the working directory
    WorkingDir(PathBuf),
    /// Per-user config directory (may not exist yet)
    UserConfig(PathBuf),
}

impl ConfigLocation {
    /// Resolve the Glovelight file path from an optional CLI argument
    pub fn resolve(explicit: Option<&Path>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::resolve_in(explicit, &cwd, dirs::config_dir())
    }

    fn resolve_in(explicit: Option<&Path>, cwd: &Path, config_dir: Option<PathBuf>) -> Self {
        if let Some(path) = explicit {
            return Self::Explicit(path.to_path_buf());
        }

        let local = cwd.join(CONFIG_FILE_NAME);
        if local.exists() {
            debug!("Using Glovelight file from working directory");
            return Self::WorkingDir(local);
        }

        let user_dir = config_dir.unwrap_or_else(|| cwd.to_path_buf()).join(APP_DIR);
        Self::UserConfig(user_dir.join(CONFIG_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Explicit(path) | Self::WorkingDir(path) | Self::UserConfig(path) => path,
        }
    }
}
