//! File system paths for the client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for client runtime files (~/.liftlog)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.liftlog`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".liftlog"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    ///
    /// Used by tests to isolate state under a temporary directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.liftlog).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.liftlog/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the session store file path (~/.liftlog/session.json).
    pub fn session_file(&self) -> PathBuf {
        self.base_dir.join("session.json")
    }

    /// Ensure the base directory exists.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_base_dir_drives_file_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(tmp.path().to_path_buf());

        assert_eq!(paths.config_file(), tmp.path().join("config.json"));
        assert_eq!(paths.session_file(), tmp.path().join("session.json"));
    }

    #[test]
    fn ensure_dirs_creates_base_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(tmp.path().join("nested").join("dir"));

        paths.ensure_dirs().unwrap();
        assert!(paths.base_dir().is_dir());
    }
}
