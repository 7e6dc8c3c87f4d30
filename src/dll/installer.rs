//! DLL backup and override installation.
//!
//! Overrides follow a compensating-action protocol: before the first
//! destructive write into a game's install directory, every detected DLL is
//! copied into a per-app backup, staged in a temp directory and committed
//! with a single rename so a half-written backup can never be observed.
//! Restore copies the backup over whatever is currently installed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::game::DetectedDll;

const METADATA_FILE: &str = "backup.json";

/// Metadata stored alongside the backed-up files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub app_id: u64,
    pub game_name: String,
    pub created_at: DateTime<Utc>,
    pub files: Vec<BackedUpFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackedUpFile {
    pub dll_name: String,
    /// Where the file came from (and where restore puts it back).
    pub original_path: PathBuf,
    /// File name within the backup directory.
    pub backup_file: String,
    pub version: String,
}

/// Per-file outcome of an update. Failures carry the reason so the caller can
/// retry selectively; nothing is rolled back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum FileOutcome {
    Updated,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct FileUpdateResult {
    pub name: String,
    pub from_version: String,
    pub to_version: String,
    pub outcome: FileOutcome,
}

/// Structured result of `update_dlls`: one entry per attempted file.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateReport {
    pub app_id: u64,
    pub files: Vec<FileUpdateResult>,
}

impl UpdateReport {
    pub fn all_succeeded(&self) -> bool {
        self.files
            .iter()
            .all(|f| matches!(f.outcome, FileOutcome::Updated))
    }
}

/// Backup store rooted at the configured backups directory.
#[derive(Debug, Clone)]
pub struct Installer {
    backups_dir: PathBuf,
}

impl Installer {
    pub fn new(backups_dir: PathBuf) -> Self {
        Self { backups_dir }
    }

    fn backup_dir(&self, app_id: u64) -> PathBuf {
        self.backups_dir.join(app_id.to_string())
    }

    fn metadata_path(&self, app_id: u64) -> PathBuf {
        self.backup_dir(app_id).join(METADATA_FILE)
    }

    /// Pure query: does a committed backup exist for this app?
    pub fn has_backup(&self, app_id: u64) -> bool {
        self.metadata_path(app_id).is_file()
    }

    pub fn load_backup(&self, app_id: u64) -> Result<Option<BackupManifest>> {
        let path = self.metadata_path(app_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io("reading backup metadata", &path, e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Ensure a backup of `dlls` exists, creating one if needed.
    ///
    /// Creation is atomic: files and metadata are staged into a temp
    /// directory and committed with one rename. An existing backup is
    /// returned untouched; re-staging while one exists is a no-op.
    pub fn ensure_backup(
        &self,
        app_id: u64,
        game_name: &str,
        dlls: &[DetectedDll],
    ) -> Result<BackupManifest> {
        if let Some(existing) = self.load_backup(app_id)? {
            return Ok(existing);
        }
        if dlls.is_empty() {
            return Err(Error::NothingToBackUp(app_id));
        }

        crate::paths::ensure_dir(&self.backups_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&self.backups_dir)
            .map_err(|e| Error::io("creating backup staging dir", &self.backups_dir, e))?;

        let mut used_names: HashSet<String> = HashSet::new();
        let mut files = Vec::with_capacity(dlls.len());
        for dll in dlls {
            // The same family name can occur in several subdirectories of one
            // install; keep every copy distinct within the flat backup dir.
            let mut backup_file = dll.name.clone();
            let mut counter = 1;
            while !used_names.insert(backup_file.clone()) {
                backup_file = format!("{}.{}", counter, dll.name);
                counter += 1;
            }

            let dest = staging.path().join(&backup_file);
            std::fs::copy(&dll.path, &dest)
                .map_err(|e| Error::io("backing up DLL", &dll.path, e))?;

            files.push(BackedUpFile {
                dll_name: dll.name.clone(),
                original_path: dll.path.clone(),
                backup_file,
                version: dll.version.clone(),
            });
        }

        let manifest = BackupManifest {
            app_id,
            game_name: game_name.to_string(),
            created_at: Utc::now(),
            files,
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        let meta_path = staging.path().join(METADATA_FILE);
        std::fs::write(&meta_path, json)
            .map_err(|e| Error::io("writing backup metadata", &meta_path, e))?;

        let final_dir = self.backup_dir(app_id);
        let staged = staging.keep();
        if let Err(e) = std::fs::rename(&staged, &final_dir) {
            let _ = std::fs::remove_dir_all(&staged);
            // A concurrent stage may have committed first; that backup is
            // just as good.
            if let Some(existing) = self.load_backup(app_id)? {
                warn!("backup for {} was created concurrently", app_id);
                return Ok(existing);
            }
            return Err(Error::io("committing backup", &final_dir, e));
        }

        info!(
            "backed up {} DLLs for {} ({})",
            manifest.files.len(),
            game_name,
            app_id
        );
        Ok(manifest)
    }

    /// Copy every backed-up file over its original location.
    ///
    /// Fails with [`Error::BackupMissing`] when no backup exists; files are
    /// left untouched in that case.
    pub fn restore(&self, app_id: u64) -> Result<()> {
        let manifest = self
            .load_backup(app_id)?
            .ok_or(Error::BackupMissing(app_id))?;

        let dir = self.backup_dir(app_id);
        for file in &manifest.files {
            let source = dir.join(&file.backup_file);
            std::fs::copy(&source, &file.original_path)
                .map_err(|e| Error::io("restoring DLL", &file.original_path, e))?;
        }

        info!("restored {} DLLs for app {}", manifest.files.len(), app_id);
        Ok(())
    }

    /// Drop the backup for an app (after a restore the user is done with).
    pub fn delete_backup(&self, app_id: u64) -> Result<()> {
        let dir = self.backup_dir(app_id);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io("deleting backup", &dir, e)),
        }
    }
}

/// Overwrite `target` with the cached payload. The byte copy is the
/// destructive step of an update; callers must have committed a backup first.
pub fn install_payload(payload: &Path, target: &Path) -> Result<()> {
    std::fs::copy(payload, target)
        .map(|_| ())
        .map_err(|e| Error::io("installing DLL payload", target, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::DllKind;
    use tempfile::TempDir;

    fn detected(path: &Path, name: &str, version: &str) -> DetectedDll {
        DetectedDll {
            name: name.to_string(),
            path: path.to_path_buf(),
            version: version.to_string(),
            kind: DllKind::Upscaler,
        }
    }

    fn write_game_dll(game_dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = game_dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn backup_then_restore_round_trip() {
        let root = TempDir::new().unwrap();
        let game_dir = root.path().join("game");
        std::fs::create_dir_all(&game_dir).unwrap();
        let dll_path = write_game_dll(&game_dir, "nvngx_dlss.dll", b"original 3.7.0");

        let installer = Installer::new(root.path().join("backups"));
        assert!(!installer.has_backup(1091500));

        let dlls = vec![detected(&dll_path, "nvngx_dlss.dll", "3.7.0")];
        installer.ensure_backup(1091500, "Cyberpunk 2077", &dlls).unwrap();
        assert!(installer.has_backup(1091500));

        // Destructive overwrite, then restore.
        std::fs::write(&dll_path, b"replacement 3.8.0").unwrap();
        installer.restore(1091500).unwrap();
        assert_eq!(std::fs::read(&dll_path).unwrap(), b"original 3.7.0");
    }

    #[test]
    fn ensure_backup_is_idempotent_while_one_exists() {
        let root = TempDir::new().unwrap();
        let game_dir = root.path().join("game");
        std::fs::create_dir_all(&game_dir).unwrap();
        let dll_path = write_game_dll(&game_dir, "nvngx_dlss.dll", b"v1");

        let installer = Installer::new(root.path().join("backups"));
        let dlls = vec![detected(&dll_path, "nvngx_dlss.dll", "1.0")];
        let first = installer.ensure_backup(7, "Game", &dlls).unwrap();

        // Mutate the file; a second ensure must keep the original copy.
        std::fs::write(&dll_path, b"v2").unwrap();
        let second = installer.ensure_backup(7, "Game", &dlls).unwrap();
        assert_eq!(first.created_at, second.created_at);

        installer.restore(7).unwrap();
        assert_eq!(std::fs::read(&dll_path).unwrap(), b"v1");
    }

    #[test]
    fn restore_without_backup_fails_and_touches_nothing() {
        let root = TempDir::new().unwrap();
        let installer = Installer::new(root.path().join("backups"));
        match installer.restore(42) {
            Err(Error::BackupMissing(42)) => {}
            other => panic!("expected BackupMissing, got {other:?}"),
        }
    }

    #[test]
    fn failed_staging_leaves_no_backup_behind() {
        let root = TempDir::new().unwrap();
        let installer = Installer::new(root.path().join("backups"));

        // Second file does not exist, so staging fails partway through.
        let game_dir = root.path().join("game");
        std::fs::create_dir_all(&game_dir).unwrap();
        let good = write_game_dll(&game_dir, "nvngx_dlss.dll", b"ok");
        let dlls = vec![
            detected(&good, "nvngx_dlss.dll", "1.0"),
            detected(&game_dir.join("nvngx_dlssg.dll"), "nvngx_dlssg.dll", "1.0"),
        ];

        assert!(installer.ensure_backup(9, "Game", &dlls).is_err());
        assert!(!installer.has_backup(9));
        // The staging temp dir was cleaned up with the error.
        let leftovers: Vec<_> = std::fs::read_dir(root.path().join("backups"))
            .map(|rd| rd.filter_map(|e| e.ok()).collect())
            .unwrap_or_default();
        assert!(leftovers.is_empty(), "staging dir leaked: {leftovers:?}");
    }

    #[test]
    fn empty_dll_set_cannot_be_backed_up() {
        let root = TempDir::new().unwrap();
        let installer = Installer::new(root.path().join("backups"));
        assert!(matches!(
            installer.ensure_backup(5, "Game", &[]),
            Err(Error::NothingToBackUp(5))
        ));
    }

    #[test]
    fn duplicate_file_names_stay_distinct_in_backup() {
        let root = TempDir::new().unwrap();
        let a_dir = root.path().join("game/bin");
        let b_dir = root.path().join("game/engine");
        std::fs::create_dir_all(&a_dir).unwrap();
        std::fs::create_dir_all(&b_dir).unwrap();
        let a = write_game_dll(&a_dir, "nvngx_dlss.dll", b"copy-a");
        let b = write_game_dll(&b_dir, "nvngx_dlss.dll", b"copy-b");

        let installer = Installer::new(root.path().join("backups"));
        let dlls = vec![
            detected(&a, "nvngx_dlss.dll", "1.0"),
            detected(&b, "nvngx_dlss.dll", "1.0"),
        ];
        installer.ensure_backup(3, "Game", &dlls).unwrap();

        std::fs::write(&a, b"changed").unwrap();
        std::fs::write(&b, b"changed").unwrap();
        installer.restore(3).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), b"copy-a");
        assert_eq!(std::fs::read(&b).unwrap(), b"copy-b");
    }

    #[test]
    fn delete_backup_clears_the_query() {
        let root = TempDir::new().unwrap();
        let game_dir = root.path().join("game");
        std::fs::create_dir_all(&game_dir).unwrap();
        let dll = write_game_dll(&game_dir, "libxess.dll", b"x");

        let installer = Installer::new(root.path().join("backups"));
        installer
            .ensure_backup(11, "Game", &[detected(&dll, "libxess.dll", "1.0")])
            .unwrap();
        assert!(installer.has_backup(11));

        installer.delete_backup(11).unwrap();
        assert!(!installer.has_backup(11));
        installer.delete_backup(11).unwrap();
    }
}
