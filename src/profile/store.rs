use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::types::Profile;
use crate::error::{Error, Result};

/// File-backed profile store: one JSON document per app id.
///
/// Saves are atomic (temp file in the profiles directory, then rename) and
/// durable before returning, so a reader can never observe a partially
/// written profile and a successful save survives a crash.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, app_id: u64) -> PathBuf {
        self.dir.join(format!("{app_id}.json"))
    }

    /// Pure existence query; keeps `Game::has_profile` in lockstep with the
    /// store.
    pub fn exists(&self, app_id: u64) -> bool {
        self.path_for(app_id).is_file()
    }

    /// Load a profile. Absence is `Ok(None)`, not an error.
    pub fn load(&self, app_id: u64) -> Result<Option<Profile>> {
        let path = self.path_for(app_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io("reading profile", &path, e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Overwrite the stored profile for an app id.
    pub fn save(&self, app_id: u64, profile: &Profile) -> Result<()> {
        crate::paths::ensure_dir(&self.dir)?;
        let path = self.path_for(app_id);

        let json = serde_json::to_string_pretty(profile)?;
        let mut temp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| Error::io("creating temp file", &self.dir, e))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| Error::io("writing profile", &path, e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| Error::io("syncing profile", &path, e))?;
        temp.persist(&path)
            .map_err(|e| Error::io("persisting profile", &path, e.error))?;

        info!("saved profile for app {}", app_id);
        Ok(())
    }

    /// Remove a stored profile. Removing an absent profile is a no-op.
    pub fn delete(&self, app_id: u64) -> Result<()> {
        let path = self.path_for(app_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("deleted profile for app {}", app_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io("deleting profile", &path, e)),
        }
    }

    /// Every stored profile, keyed by app id. Files that are not
    /// `<appid>.json` or fail to decode are skipped.
    pub fn list(&self) -> Result<BTreeMap<u64, Profile>> {
        let mut profiles = BTreeMap::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(profiles),
            Err(e) => return Err(Error::io("listing profiles", &self.dir, e)),
        };

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(app_id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
            else {
                continue;
            };
            match self.load(app_id) {
                Ok(Some(profile)) => {
                    profiles.insert(app_id, profile);
                }
                Ok(None) => {}
                Err(e) => debug!("skipping unreadable profile {:?}: {}", path, e),
            }
        }

        Ok(profiles)
    }
}
