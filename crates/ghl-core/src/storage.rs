//! Location and permissions of the local state files.
//!
//! Everything lives under `$XDG_CONFIG_HOME/ghl/`. The directory is created
//! with mode `0700` and every file is written with mode `0600`, since the
//! credential and profile files hold API tokens.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Name of the application directory inside the platform config dir.
pub const APP_DIR: &str = "ghl";

/// Platform-appropriate directory for all `ghl` state files.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join(APP_DIR)
}

/// Paths of every local state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub config: PathBuf,
    pub credentials: PathBuf,
    pub profiles: PathBuf,
    pub saved_searches: PathBuf,
}

impl StatePaths {
    /// All files inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            config: dir.join("config.yaml"),
            credentials: dir.join("credentials.json"),
            profiles: dir.join("profiles.json"),
            saved_searches: dir.join("saved_searches.json"),
        }
    }

    /// Default locations, with an optional override for the config file.
    pub fn with_config(config: Option<PathBuf>) -> Self {
        let mut paths = Self::default();
        if let Some(config) = config {
            paths.config = config;
        }
        paths
    }
}

impl Default for StatePaths {
    fn default() -> Self {
        Self::in_dir(&config_dir())
    }
}

/// Create `dir` (and parents) and restrict it to the current user.
pub fn ensure_private_dir(dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))
            .with_context(|| format!("failed to set permissions on {}", dir.display()))?;
    }
    Ok(())
}

/// Write `contents` to `path` with owner-only permissions.
///
/// The parent directory is created if needed. The content goes to a sibling
/// temporary file first and is renamed into place.
pub fn write_private(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_private_dir(parent)?;
        }
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to set permissions on {}", tmp.display()))?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

/// Remove `path`, treating a missing file as success.
pub fn remove_if_exists(path: &Path) -> anyhow::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}
