use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::{Error, Result};

const APP_DIR: &str = "swapdeck";

/// Resolved on-disk locations for everything the core persists.
///
/// Defaults follow the XDG layout via the `dirs` crate; the backup and
/// payload-cache roots can be redirected through [`Settings`].
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Profile files and `config.toml`.
    pub config_dir: PathBuf,
    /// Game database and DLL backups.
    pub data_dir: PathBuf,
    /// Manifest cache database and downloaded DLL payloads.
    pub cache_dir: PathBuf,
    backup_dir: Option<PathBuf>,
    payload_cache_dir: Option<PathBuf>,
}

impl AppPaths {
    /// Resolve paths from the platform directories, honoring overrides in
    /// `settings`.
    pub fn resolve(settings: &Settings) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("no config directory on this platform".into()))?
            .join(APP_DIR);
        let data_dir = dirs::data_dir()
            .ok_or_else(|| Error::Config("no data directory on this platform".into()))?
            .join(APP_DIR);
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Config("no cache directory on this platform".into()))?
            .join(APP_DIR);

        Ok(Self {
            config_dir,
            data_dir,
            cache_dir,
            backup_dir: settings.backup_dir.clone(),
            payload_cache_dir: settings.dll_cache_dir.clone(),
        })
    }

    /// Build paths rooted at a single directory. Used by tests and by shells
    /// that sandbox their state.
    pub fn rooted_at(root: &Path, settings: &Settings) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            backup_dir: settings.backup_dir.clone(),
            payload_cache_dir: settings.dll_cache_dir.clone(),
        }
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.config_dir.join("profiles")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("games.json")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("backups"))
    }

    pub fn backup_dir_for(&self, app_id: u64) -> PathBuf {
        self.backups_dir().join(app_id.to_string())
    }

    pub fn manifest_db_path(&self) -> PathBuf {
        self.cache_dir.join("manifest.db")
    }

    pub fn payload_cache_dir(&self) -> PathBuf {
        self.payload_cache_dir
            .clone()
            .unwrap_or_else(|| self.cache_dir.join("dlls"))
    }
}

/// `create_dir_all` with the crate's error context attached.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| Error::io("creating directory", dir, e))
}
