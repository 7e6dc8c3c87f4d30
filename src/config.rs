use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_MANIFEST_URL: &str =
    "https://raw.githubusercontent.com/swapdeck/swapdeck-dlls/main/manifest.json";

/// Read-only settings consumed by the core.
///
/// The shell owns this file and writes it; the core only loads it. A missing
/// file yields the defaults, a malformed file is an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Explicit Steam root; probed from the usual locations when empty.
    pub steam_path: Option<PathBuf>,
    /// Library roots scanned in addition to those Steam knows about.
    pub extra_library_roots: Vec<PathBuf>,
    /// Source of the latest-known DLL versions.
    pub manifest_url: String,
    /// How long a cached manifest stays fresh.
    pub manifest_refresh_hours: u32,
    /// Override for the DLL backup root (defaults under the data dir).
    pub backup_dir: Option<PathBuf>,
    /// Override for the downloaded-payload cache (defaults under the cache dir).
    pub dll_cache_dir: Option<PathBuf>,
    /// Rescan the Steam libraries when the shell starts.
    pub rescan_on_startup: bool,
    /// Check the manifest for DLL updates automatically.
    pub check_updates: bool,

    // Presentation preferences: carried for the shell, ignored by the core.
    pub theme: String,
    pub compact_mode: bool,
    pub confirm_destructive: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            steam_path: None,
            extra_library_roots: Vec::new(),
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            manifest_refresh_hours: 24,
            backup_dir: None,
            dll_cache_dir: None,
            rescan_on_startup: true,
            check_updates: true,
            theme: "default".to_string(),
            compact_mode: false,
            confirm_destructive: true,
        }
    }
}

impl Settings {
    /// Load settings from `config.toml` in `config_dir`.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join("config.toml");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::io("reading config", &path, e)),
        };

        let settings: Settings = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(settings)
    }
}
