//! Steam library discovery and the full scan pass.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::dll::inventory;
use crate::error::{Error, Result};
use crate::game::database::GameDatabase;
use crate::game::Game;
use crate::steam::appmanifest::AppManifest;
use crate::steam::prefix::ProtonPrefix;
use crate::steam::vdf;

/// One skipped or unreadable item, reported to the caller instead of
/// aborting the scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub message: String,
}

/// Summary of a completed scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub libraries_scanned: usize,
    pub games_found: usize,
    pub duplicates_skipped: usize,
    pub issues: Vec<ScanIssue>,
}

/// Locate the Steam root. A configured `steam_path` is authoritative (a
/// missing one disables Steam discovery rather than silently probing
/// elsewhere); without one the usual install locations are probed.
pub fn find_steam_root(settings: &Settings) -> Option<PathBuf> {
    if let Some(ref configured) = settings.steam_path {
        if configured.is_dir() {
            return Some(configured.clone());
        }
        warn!("configured steam_path {:?} does not exist", configured);
        return None;
    }

    let home = dirs::home_dir()?;
    let candidates = [
        home.join(".steam").join("steam"),
        home.join(".local").join("share").join("Steam"),
        home.join(".var")
            .join("app")
            .join("com.valvesoftware.Steam")
            .join(".steam")
            .join("steam"),
    ];
    candidates.into_iter().find(|p| p.is_dir())
}

/// Enumerate library roots: the Steam root itself, every entry in its
/// `libraryfolders.vdf`, then the configured extra roots. Order is discovery
/// order and duplicates are dropped, which is what makes first-found-wins
/// deduplication of games deterministic.
pub fn discover_libraries(
    steam_root: Option<&Path>,
    extra_roots: &[PathBuf],
    issues: &mut Vec<ScanIssue>,
) -> Vec<PathBuf> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut roots = Vec::new();
    let mut push = |path: PathBuf, roots: &mut Vec<PathBuf>| {
        if seen.insert(path.clone()) {
            roots.push(path);
        }
    };

    if let Some(root) = steam_root {
        push(root.to_path_buf(), &mut roots);

        let vdf_path = root.join("steamapps").join("libraryfolders.vdf");
        match std::fs::read_to_string(&vdf_path) {
            Ok(content) => match vdf::parse(&content) {
                Ok(parsed) => {
                    if let Some(folders) = parsed.get_node("libraryfolders") {
                        for (_, value) in folders.entries() {
                            if let vdf::VdfValue::Node(folder) = value {
                                if let Some(path) = folder.get_str("path").filter(|p| !p.is_empty())
                                {
                                    push(PathBuf::from(path), &mut roots);
                                }
                            }
                        }
                    }
                }
                Err(e) => issues.push(ScanIssue {
                    path: vdf_path,
                    message: format!("unparsable libraryfolders.vdf: {e}"),
                }),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no libraryfolders.vdf under {:?}", root);
            }
            Err(e) => issues.push(ScanIssue {
                path: vdf_path,
                message: format!("unreadable libraryfolders.vdf: {e}"),
            }),
        }
    }

    for extra in extra_roots {
        push(extra.clone(), &mut roots);
    }

    roots
}

/// Walk every library and build a fresh database.
///
/// Per-item failures become [`ScanIssue`]s; the only errors that abort the
/// scan are supersession (`should_abort` observed true) and none others.
pub fn scan_all(
    settings: &Settings,
    should_abort: &dyn Fn() -> bool,
) -> Result<(GameDatabase, ScanReport)> {
    let mut report = ScanReport::default();
    let steam_root = find_steam_root(settings);
    if steam_root.is_none() && settings.extra_library_roots.is_empty() {
        info!("no Steam installation found and no extra roots configured");
        return Ok((GameDatabase::default(), report));
    }

    let roots = discover_libraries(
        steam_root.as_deref(),
        &settings.extra_library_roots,
        &mut report.issues,
    );

    let mut db = GameDatabase::default();
    for root in &roots {
        if should_abort() {
            return Err(Error::ScanSuperseded);
        }
        scan_library(root, should_abort, &mut db, &mut report)?;
        report.libraries_scanned += 1;
    }

    report.games_found = db.len();
    db.updated_at = Some(Utc::now());
    info!(
        "scan complete: {} games across {} libraries ({} issues)",
        report.games_found,
        report.libraries_scanned,
        report.issues.len()
    );
    Ok((db, report))
}

fn scan_library(
    root: &Path,
    should_abort: &dyn Fn() -> bool,
    db: &mut GameDatabase,
    report: &mut ScanReport,
) -> Result<()> {
    let steamapps = root.join("steamapps");
    let entries = match std::fs::read_dir(&steamapps) {
        Ok(e) => e,
        Err(e) => {
            report.issues.push(ScanIssue {
                path: steamapps,
                message: format!("unreadable library: {e}"),
            });
            return Ok(());
        }
    };

    let mut manifest_paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("appmanifest_") && n.ends_with(".acf"))
                .unwrap_or(false)
        })
        .collect();
    manifest_paths.sort();

    for manifest_path in manifest_paths {
        if should_abort() {
            return Err(Error::ScanSuperseded);
        }

        let manifest = match AppManifest::parse_file(&manifest_path) {
            Ok(Some(m)) => m,
            Ok(None) => continue,
            Err(e) => {
                report.issues.push(ScanIssue {
                    path: manifest_path,
                    message: format!("unreadable app manifest: {e}"),
                });
                continue;
            }
        };

        if !manifest.is_fully_installed() {
            debug!("skipping partial install {} ({})", manifest.name, manifest.app_id);
            continue;
        }

        let install_dir = manifest.full_install_dir();
        let prefix = ProtonPrefix::probe(&root.join("steamapps").join("compatdata"), manifest.app_id);
        let dlls = inventory::scan_install_dir(&install_dir);

        let game = Game {
            app_id: manifest.app_id,
            name: manifest.name.clone(),
            install_dir,
            library_path: root.to_path_buf(),
            prefix_path: prefix.is_valid.then_some(prefix.path),
            dlls,
            scanned_at: Utc::now(),
        };

        if !db.insert(game) {
            report.duplicates_skipped += 1;
            report.issues.push(ScanIssue {
                path: manifest_path,
                message: format!(
                    "duplicate app id {} (first-found copy kept)",
                    manifest.app_id
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dll::version_info::test_support::version_resource;
    use tempfile::TempDir;

    fn write_manifest(library: &Path, app_id: u64, name: &str, installdir: &str, state: u32) {
        let steamapps = library.join("steamapps");
        std::fs::create_dir_all(&steamapps).unwrap();
        let content = format!(
            "\"AppState\"\n{{\n\t\"appid\"\t\"{app_id}\"\n\t\"name\"\t\"{name}\"\n\t\"StateFlags\"\t\"{state}\"\n\t\"installdir\"\t\"{installdir}\"\n}}\n"
        );
        std::fs::write(steamapps.join(format!("appmanifest_{app_id}.acf")), content).unwrap();
    }

    fn write_install(library: &Path, installdir: &str, dlls: &[(&str, (u16, u16, u16, u16))]) {
        let dir = library.join("steamapps").join("common").join(installdir);
        std::fs::create_dir_all(&dir).unwrap();
        for (name, (maj, min, build, rev)) in dlls {
            std::fs::write(dir.join(name), version_resource(*maj, *min, *build, *rev)).unwrap();
        }
    }

    fn settings_for(root: &Path) -> Settings {
        Settings {
            steam_path: Some(root.to_path_buf()),
            ..Settings::default()
        }
    }

    #[test]
    fn scans_games_with_inventories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        write_manifest(root, 1091500, "Cyberpunk 2077", "Cyberpunk 2077", 4);
        write_install(
            root,
            "Cyberpunk 2077",
            &[
                ("nvngx_dlss.dll", (3, 7, 0, 0)),
                ("nvngx_dlssg.dll", (3, 7, 0, 0)),
            ],
        );
        write_manifest(root, 1245620, "ELDEN RING", "ELDEN RING", 4);
        write_install(root, "ELDEN RING", &[]);

        let (db, report) = scan_all(&settings_for(root), &|| false).unwrap();
        assert_eq!(report.games_found, 2);
        assert_eq!(report.libraries_scanned, 1);
        assert!(report.issues.is_empty());

        assert_eq!(db.get(1091500).unwrap().dlls.len(), 2);
        assert!(db.get(1245620).unwrap().dlls.is_empty());
    }

    #[test]
    fn partial_installs_are_skipped() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), 292030, "The Witcher 3", "Witcher 3", 1026);

        let (db, _) = scan_all(&settings_for(dir.path()), &|| false).unwrap();
        assert!(db.get(292030).is_none());
    }

    #[test]
    fn extra_roots_are_scanned_after_the_primary() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("steam");
        let secondary = dir.path().join("mnt-library");

        write_manifest(&primary, 1091500, "Cyberpunk 2077", "Cyberpunk 2077", 4);
        write_install(&primary, "Cyberpunk 2077", &[("nvngx_dlss.dll", (3, 7, 0, 0))]);
        write_manifest(&secondary, 1091500, "Cyberpunk 2077", "Cyberpunk 2077", 4);
        write_install(&secondary, "Cyberpunk 2077", &[("nvngx_dlss.dll", (3, 8, 0, 0))]);
        write_manifest(&secondary, 292030, "The Witcher 3", "Witcher 3", 4);
        write_install(&secondary, "Witcher 3", &[("nvngx_dlss.dll", (2, 5, 1, 0))]);

        let settings = Settings {
            steam_path: Some(primary.clone()),
            extra_library_roots: vec![secondary],
            ..Settings::default()
        };

        let (db, report) = scan_all(&settings, &|| false).unwrap();
        assert_eq!(report.games_found, 2);
        assert_eq!(report.duplicates_skipped, 1);

        // First-found-wins: the primary library's copy is kept.
        let game = db.get(1091500).unwrap();
        assert_eq!(game.library_path, primary);
        assert_eq!(game.dlls[0].version, "3.7");
    }

    #[test]
    fn libraryfolders_vdf_adds_roots() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("steam");
        let second = dir.path().join("second");

        write_manifest(&primary, 1, "Game A", "Game A", 4);
        write_install(&primary, "Game A", &[]);
        write_manifest(&second, 2, "Game B", "Game B", 4);
        write_install(&second, "Game B", &[]);

        let vdf = format!(
            "\"libraryfolders\"\n{{\n\t\"0\"\n\t{{\n\t\t\"path\"\t\"{}\"\n\t}}\n\t\"1\"\n\t{{\n\t\t\"path\"\t\"{}\"\n\t}}\n}}\n",
            primary.display(),
            second.display()
        );
        std::fs::write(primary.join("steamapps").join("libraryfolders.vdf"), vdf).unwrap();

        let (db, report) = scan_all(&settings_for(&primary), &|| false).unwrap();
        assert_eq!(report.libraries_scanned, 2);
        assert!(db.get(1).is_some());
        assert!(db.get(2).is_some());
    }

    #[test]
    fn unreadable_library_is_reported_not_fatal() {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("steam");
        write_manifest(&primary, 1, "Game A", "Game A", 4);
        write_install(&primary, "Game A", &[]);

        let settings = Settings {
            steam_path: Some(primary),
            extra_library_roots: vec![dir.path().join("does-not-exist")],
            ..Settings::default()
        };

        let (db, report) = scan_all(&settings, &|| false).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].message.contains("unreadable library"));
    }

    #[test]
    fn superseded_scan_stops_early() {
        let dir = TempDir::new().unwrap();
        write_manifest(dir.path(), 1, "Game A", "Game A", 4);
        write_install(dir.path(), "Game A", &[]);

        let result = scan_all(&settings_for(dir.path()), &|| true);
        assert!(matches!(result, Err(Error::ScanSuperseded)));
    }

    #[test]
    fn no_steam_and_no_roots_is_an_empty_scan() {
        let settings = Settings {
            steam_path: Some(PathBuf::from("/definitely/not/here")),
            ..Settings::default()
        };
        let (db, report) = scan_all(&settings, &|| false).unwrap();
        assert!(db.is_empty());
        assert_eq!(report.libraries_scanned, 0);
    }
}
