use std::path::{Path, PathBuf};

/// Proton (Wine) prefix attached to a Steam app's compat-data directory.
#[derive(Debug, Clone)]
pub struct ProtonPrefix {
    pub app_id: u64,
    pub path: PathBuf,
    pub drive_c: PathBuf,
    pub is_valid: bool,
}

impl ProtonPrefix {
    /// Probe `compatdata/<appid>/pfx/drive_c`. The prefix is valid only when
    /// the drive_c directory exists.
    pub fn probe(compat_data_dir: &Path, app_id: u64) -> Self {
        let path = compat_data_dir.join(app_id.to_string());
        let drive_c = path.join("pfx").join("drive_c");
        let is_valid = drive_c.is_dir();

        Self {
            app_id,
            path,
            drive_c,
            is_valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn valid_when_drive_c_exists() {
        let dir = TempDir::new().unwrap();
        let drive_c = dir.path().join("1091500").join("pfx").join("drive_c");
        std::fs::create_dir_all(&drive_c).unwrap();

        let prefix = ProtonPrefix::probe(dir.path(), 1091500);
        assert!(prefix.is_valid);
        assert_eq!(prefix.drive_c, drive_c);
    }

    #[test]
    fn invalid_when_missing() {
        let dir = TempDir::new().unwrap();
        let prefix = ProtonPrefix::probe(dir.path(), 42);
        assert!(!prefix.is_valid);
    }
}
