use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::steam::vdf;

/// Steam marks an app fully installed with this `StateFlags` value.
const STATE_FULLY_INSTALLED: u32 = 4;

/// Parsed `appmanifest_<appid>.acf`.
#[derive(Debug, Clone)]
pub struct AppManifest {
    pub app_id: u64,
    pub name: String,
    pub install_dir: String,
    pub state_flags: u32,
    pub size_on_disk: u64,
    /// The library root the manifest lives under (parent of `steamapps/`).
    pub library_path: PathBuf,
}

impl AppManifest {
    /// Parse the manifest at `path`. Returns `Ok(None)` when the file has no
    /// `AppState` block or no usable app id, which Steam writes transiently
    /// during installs.
    pub fn parse_file(path: &Path) -> Result<Option<Self>> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io("reading app manifest", path, e))?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Option<Self>> {
        let root = vdf::parse(content)?;
        let app_state = match root.get_node("AppState") {
            Some(n) => n,
            None => return Ok(None),
        };

        let app_id = match app_state.get_str("appid").and_then(|s| s.parse().ok()) {
            Some(id) => id,
            None => return Ok(None),
        };

        // steamapps/<manifest> -> library root is two levels up.
        let library_path = path
            .parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Some(Self {
            app_id,
            name: app_state.get_str("name").unwrap_or_default().to_string(),
            install_dir: app_state
                .get_str("installdir")
                .unwrap_or_default()
                .to_string(),
            state_flags: app_state
                .get_str("StateFlags")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            size_on_disk: app_state
                .get_str("SizeOnDisk")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            library_path,
        }))
    }

    pub fn is_fully_installed(&self) -> bool {
        self.state_flags == STATE_FULLY_INSTALLED
    }

    /// Absolute install directory: `<library>/steamapps/common/<installdir>`.
    pub fn full_install_dir(&self) -> PathBuf {
        self.library_path
            .join("steamapps")
            .join("common")
            .join(&self.install_dir)
    }

    /// Proton compat-data directory for this app.
    pub fn compat_data_dir(&self) -> PathBuf {
        self.library_path
            .join("steamapps")
            .join("compatdata")
            .join(self.app_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(app_id: u64, name: &str, installdir: &str, state: u32) -> String {
        format!(
            "\"AppState\"\n{{\n\t\"appid\"\t\t\"{app_id}\"\n\t\"name\"\t\t\"{name}\"\n\t\"StateFlags\"\t\t\"{state}\"\n\t\"installdir\"\t\t\"{installdir}\"\n\t\"SizeOnDisk\"\t\t\"68719476736\"\n}}\n"
        )
    }

    #[test]
    fn parses_fields_and_derived_paths() {
        let content = manifest(1091500, "Cyberpunk 2077", "Cyberpunk 2077", 4);
        let path = Path::new("/mnt/lib/steamapps/appmanifest_1091500.acf");
        let m = AppManifest::parse(&content, path).unwrap().unwrap();

        assert_eq!(m.app_id, 1091500);
        assert_eq!(m.name, "Cyberpunk 2077");
        assert!(m.is_fully_installed());
        assert_eq!(m.size_on_disk, 68719476736);
        assert_eq!(m.library_path, Path::new("/mnt/lib"));
        assert_eq!(
            m.full_install_dir(),
            Path::new("/mnt/lib/steamapps/common/Cyberpunk 2077")
        );
        assert_eq!(
            m.compat_data_dir(),
            Path::new("/mnt/lib/steamapps/compatdata/1091500")
        );
    }

    #[test]
    fn partial_install_is_not_fully_installed() {
        let content = manifest(292030, "The Witcher 3", "Witcher 3", 1026);
        let m = AppManifest::parse(&content, Path::new("/l/steamapps/appmanifest_292030.acf"))
            .unwrap()
            .unwrap();
        assert!(!m.is_fully_installed());
    }

    #[test]
    fn missing_app_state_yields_none() {
        let m = AppManifest::parse("\"Other\"\n{\n}\n", Path::new("/x/steamapps/a.acf")).unwrap();
        assert!(m.is_none());
    }

    #[test]
    fn unparsable_appid_yields_none() {
        let content = "\"AppState\"\n{\n\t\"appid\"\t\"not-a-number\"\n}\n";
        let m = AppManifest::parse(content, Path::new("/x/steamapps/a.acf")).unwrap();
        assert!(m.is_none());
    }
}
