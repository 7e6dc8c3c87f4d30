//! The call surface the presentation shell binds to.
//!
//! Every method maps to one shell request. Operations that mutate a game's
//! on-disk state serialize on a per-app-id lock; unrelated games stay
//! concurrent, and reads never wait on another game's install. A scan
//! requested while one is running supersedes it instead of queueing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::config::Settings;
use crate::dll::installer::{FileOutcome, FileUpdateResult, Installer, UpdateReport};
use crate::dll::manifest::{self, ManifestCache, ManifestDll};
use crate::dll::{downloader, version};
use crate::error::{Error, Result};
use crate::game::database::GameDatabase;
use crate::game::{DetectedDll, Game};
use crate::paths::AppPaths;
use crate::profile::{Profile, ProfileStore};
use crate::steam::library::{self, ScanReport};
use crate::telemetry::{cpu, gpu, CpuSnapshot, GpuSnapshot};

/// Game as presented to the shell: the scan record plus the live
/// `has_profile` flag.
#[derive(Debug, Clone, Serialize)]
pub struct GameInfo {
    pub app_id: u64,
    pub name: String,
    pub install_dir: PathBuf,
    pub prefix_path: Option<PathBuf>,
    pub dlls: Vec<DetectedDll>,
    pub has_profile: bool,
}

/// Update status for one detected DLL.
#[derive(Debug, Clone, Serialize)]
pub struct DllUpdateInfo {
    pub name: String,
    pub installed_version: String,
    /// `None` when the manifest does not list this DLL (or is unavailable).
    pub latest_version: Option<String>,
    pub has_update: bool,
}

pub struct App {
    settings: Settings,
    paths: AppPaths,
    db: RwLock<GameDatabase>,
    profiles: ProfileStore,
    installer: Installer,
    http: reqwest::Client,
    scan_generation: Arc<AtomicU64>,
    app_locks: Mutex<HashMap<u64, Arc<AsyncMutex<()>>>>,
}

impl App {
    /// Build the app against the platform directories.
    pub fn new(settings: Settings) -> Result<Self> {
        let paths = AppPaths::resolve(&settings)?;
        Self::with_paths(settings, paths)
    }

    /// Build the app against explicit paths. The previous scan's database is
    /// reloaded so the shell has data before its first rescan.
    pub fn with_paths(settings: Settings, paths: AppPaths) -> Result<Self> {
        let db = GameDatabase::load(&paths.database_path())?;
        let profiles = ProfileStore::new(paths.profiles_dir());
        let installer = Installer::new(paths.backups_dir());

        Ok(Self {
            settings,
            paths,
            db: RwLock::new(db),
            profiles,
            installer,
            http: reqwest::Client::new(),
            scan_generation: Arc::new(AtomicU64::new(0)),
            app_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn game_info(&self, game: &Game) -> GameInfo {
        GameInfo {
            app_id: game.app_id,
            name: game.name.clone(),
            install_dir: game.install_dir.clone(),
            prefix_path: game.prefix_path.clone(),
            dlls: game.dlls.clone(),
            has_profile: self.profiles.exists(game.app_id),
        }
    }

    /// All scanned games, tools filtered, sorted by name.
    pub fn games(&self) -> Vec<GameInfo> {
        let db = self.db.read().expect("game database lock poisoned");
        db.list().into_iter().map(|g| self.game_info(g)).collect()
    }

    /// One game by app id; `None` for ids the last scan did not find.
    pub fn game(&self, app_id: u64) -> Option<GameInfo> {
        let db = self.db.read().expect("game database lock poisoned");
        db.get(app_id).map(|g| self.game_info(g))
    }

    /// Rescan every configured library, replacing the database wholesale.
    ///
    /// A concurrent call supersedes this one: the older scan stops at the
    /// next library or manifest boundary with [`Error::ScanSuperseded`] and
    /// its partial result is discarded.
    pub async fn scan_games(&self) -> Result<ScanReport> {
        let token = self.scan_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.scan_generation);
        let settings = self.settings.clone();

        let (new_db, report) = tokio::task::spawn_blocking(move || {
            library::scan_all(&settings, &|| {
                generation.load(Ordering::SeqCst) != token
            })
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))??;

        // Commit memory and disk under the same write lock so a superseded
        // scan can never overwrite a newer result.
        let mut db = self.db.write().expect("game database lock poisoned");
        if self.scan_generation.load(Ordering::SeqCst) != token {
            return Err(Error::ScanSuperseded);
        }
        *db = new_db;
        db.save(&self.paths.database_path())?;

        Ok(report)
    }

    /// Stored profile for a game; `None` until one is explicitly saved.
    pub fn profile(&self, app_id: u64) -> Result<Option<Profile>> {
        self.profiles.load(app_id)
    }

    /// Persist a full profile for a game (overwrite, durable on return).
    pub fn save_profile(&self, app_id: u64, profile: &Profile) -> Result<()> {
        self.profiles.save(app_id, profile)
    }

    /// Remove a game's stored profile.
    pub fn delete_profile(&self, app_id: u64) -> Result<()> {
        self.profiles.delete(app_id)
    }

    /// Compare a game's detected DLLs against the manifest.
    ///
    /// With no usable manifest the call degrades to "no updates known":
    /// every entry carries `latest_version: None, has_update: false`.
    pub async fn check_dll_updates(&self, app_id: u64) -> Result<Vec<DllUpdateInfo>> {
        let dlls = {
            let db = self.db.read().expect("game database lock poisoned");
            db.get(app_id)
                .ok_or(Error::GameNotFound(app_id))?
                .dlls
                .clone()
        };
        if dlls.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<String> = dlls.iter().map(|d| d.name.clone()).collect();
        let latest = match self.latest_builds(names).await {
            Ok(Some(map)) => map,
            Ok(None) => {
                warn!("manifest unavailable, reporting no known updates");
                HashMap::new()
            }
            Err(e) => {
                warn!("manifest lookup failed ({}), reporting no known updates", e);
                HashMap::new()
            }
        };

        Ok(dlls
            .iter()
            .map(|dll| {
                let build = latest.get(&dll.name);
                let has_update = match build {
                    // Unknown to the manifest is not outdated.
                    None => false,
                    Some(b) => {
                        b.version != dll.version && version::is_newer(&dll.version, &b.version)
                    }
                };
                DllUpdateInfo {
                    name: dll.name.clone(),
                    installed_version: dll.version.clone(),
                    latest_version: build.map(|b| b.version.clone()),
                    has_update,
                }
            })
            .collect())
    }

    /// Force-refresh the manifest cache from the configured URL.
    pub async fn refresh_manifest(&self) -> Result<()> {
        let fetched = manifest::fetch(&self.http, &self.settings.manifest_url).await?;
        let db_path = self.paths.manifest_db_path();
        tokio::task::spawn_blocking(move || -> Result<()> {
            ManifestCache::open(&db_path)?.replace(&fetched)
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))?
    }

    /// Install the latest manifest builds over a game's outdated DLLs.
    ///
    /// A backup of every detected DLL is committed before the first
    /// destructive write; failure to back up aborts the whole operation.
    /// After that, each file succeeds or fails independently and the
    /// [`UpdateReport`] carries the per-file outcomes.
    pub async fn update_dlls(&self, app_id: u64) -> Result<UpdateReport> {
        let lock = self.lock_for(app_id);
        let _guard = lock.lock().await;

        let game = {
            let db = self.db.read().expect("game database lock poisoned");
            db.get(app_id).ok_or(Error::GameNotFound(app_id))?.clone()
        };

        let mut report = UpdateReport {
            app_id,
            files: Vec::new(),
        };
        if game.dlls.is_empty() {
            return Ok(report);
        }

        let names: Vec<String> = game.dlls.iter().map(|d| d.name.clone()).collect();
        let latest = self
            .latest_builds(names)
            .await?
            .ok_or_else(|| Error::ManifestUnavailable("no manifest cached or fetchable".into()))?;

        let targets: Vec<(&DetectedDll, &ManifestDll)> = game
            .dlls
            .iter()
            .filter_map(|dll| {
                let build = latest.get(&dll.name)?;
                (build.version != dll.version && version::is_newer(&dll.version, &build.version))
                    .then_some((dll, build))
            })
            .collect();
        if targets.is_empty() {
            info!("no DLL updates pending for {} ({})", game.name, app_id);
            return Ok(report);
        }

        // Backup precedes the first overwrite, atomically and for the whole
        // detected set; if it cannot be created, nothing is touched.
        self.installer
            .ensure_backup(app_id, &game.name, &game.dlls)?;

        let cache_dir = self.paths.payload_cache_dir();
        for (dll, build) in targets {
            let outcome =
                match downloader::get_or_download(&self.http, &cache_dir, &dll.name, build).await {
                    Ok(payload) => {
                        match crate::dll::installer::install_payload(&payload, &dll.path) {
                            Ok(()) => FileOutcome::Updated,
                            Err(e) => FileOutcome::Failed(e.to_string()),
                        }
                    }
                    Err(e) => FileOutcome::Failed(e.to_string()),
                };

            if let FileOutcome::Failed(ref reason) = outcome {
                warn!("updating {} for {} failed: {}", dll.name, app_id, reason);
            }
            report.files.push(FileUpdateResult {
                name: dll.name.clone(),
                from_version: dll.version.clone(),
                to_version: build.version.clone(),
                outcome,
            });
        }

        info!(
            "updated {}/{} DLLs for {} ({})",
            report
                .files
                .iter()
                .filter(|f| matches!(f.outcome, FileOutcome::Updated))
                .count(),
            report.files.len(),
            game.name,
            app_id
        );
        Ok(report)
    }

    /// Copy the backed-up DLLs over the installed ones.
    pub async fn restore_dlls(&self, app_id: u64) -> Result<()> {
        let lock = self.lock_for(app_id);
        let _guard = lock.lock().await;
        self.installer.restore(app_id)
    }

    /// Whether a committed DLL backup exists for this game.
    pub fn has_dll_backup(&self, app_id: u64) -> bool {
        self.installer.has_backup(app_id)
    }

    /// Best-effort GPU point sample.
    pub fn gpu_info(&self) -> GpuSnapshot {
        gpu::sample()
    }

    /// Best-effort CPU point sample.
    pub fn cpu_info(&self) -> CpuSnapshot {
        cpu::sample()
    }

    /// Remove every downloaded DLL payload.
    pub fn clear_payload_cache(&self) -> Result<()> {
        downloader::clear_cache(&self.paths.payload_cache_dir())
    }

    /// Total bytes held by downloaded DLL payloads.
    pub fn payload_cache_size(&self) -> u64 {
        downloader::cache_size(&self.paths.payload_cache_dir())
    }

    fn lock_for(&self, app_id: u64) -> Arc<AsyncMutex<()>> {
        let mut locks = self.app_locks.lock().expect("lock registry poisoned");
        Arc::clone(
            locks
                .entry(app_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Latest manifest build per DLL name.
    ///
    /// Uses the cache while fresh, refreshes it otherwise, and falls back to
    /// a stale cache when the fetch fails. `Ok(None)` means no manifest is
    /// available at all.
    async fn latest_builds(
        &self,
        names: Vec<String>,
    ) -> Result<Option<HashMap<String, ManifestDll>>> {
        let db_path = self.paths.manifest_db_path();
        let ttl_hours = self.settings.manifest_refresh_hours;

        let (usable_without_fetch, cache_empty) = {
            let db_path = db_path.clone();
            tokio::task::spawn_blocking(move || -> Result<(bool, bool)> {
                let cache = ManifestCache::open(&db_path)?;
                let empty = cache.is_empty()?;
                Ok((!empty && cache.is_fresh(ttl_hours)?, empty))
            })
            .await
            .map_err(|e| Error::Task(e.to_string()))??
        };

        if usable_without_fetch {
            return self.builds_from_cache(db_path, names).await.map(Some);
        }

        match manifest::fetch(&self.http, &self.settings.manifest_url).await {
            Ok(fetched) => {
                let db_path_for_replace = db_path.clone();
                tokio::task::spawn_blocking(move || -> Result<()> {
                    ManifestCache::open(&db_path_for_replace)?.replace(&fetched)
                })
                .await
                .map_err(|e| Error::Task(e.to_string()))??;
                self.builds_from_cache(db_path, names).await.map(Some)
            }
            Err(e) if !cache_empty => {
                warn!("manifest refresh failed ({}), using stale cache", e);
                self.builds_from_cache(db_path, names).await.map(Some)
            }
            Err(e) => {
                warn!("manifest unavailable and no cache: {}", e);
                Ok(None)
            }
        }
    }

    async fn builds_from_cache(
        &self,
        db_path: PathBuf,
        names: Vec<String>,
    ) -> Result<HashMap<String, ManifestDll>> {
        tokio::task::spawn_blocking(move || -> Result<HashMap<String, ManifestDll>> {
            let cache = ManifestCache::open(&db_path)?;
            let mut map = HashMap::new();
            for name in names {
                if let Some(build) = cache.latest(&name)? {
                    map.insert(name, build);
                }
            }
            Ok(map)
        })
        .await
        .map_err(|e| Error::Task(e.to_string()))?
    }
}
