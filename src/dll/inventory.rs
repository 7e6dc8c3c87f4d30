//! Per-game DLL inventory: walk the install directory for the known
//! graphics-override DLL families and read their embedded versions.

use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::version_info;
use crate::game::{DetectedDll, DllKind};

/// The DLL families the manager knows how to override, by lowercase filename.
const KNOWN_DLLS: &[(&str, DllKind)] = &[
    ("nvngx_dlss.dll", DllKind::Upscaler),
    ("nvngx_dlssg.dll", DllKind::FrameGeneration),
    ("nvngx_dlssd.dll", DllKind::RayReconstruction),
    ("libxess.dll", DllKind::Upscaler),
    ("amd_fidelityfx_vk.dll", DllKind::Upscaler),
    ("amd_fidelityfx_dx12.dll", DllKind::Upscaler),
];

pub fn classify(file_name: &str) -> Option<DllKind> {
    let lower = file_name.to_lowercase();
    KNOWN_DLLS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, kind)| *kind)
}

/// Scan `install_dir` for known DLLs.
///
/// Unreadable directory entries are skipped; a file with no readable version
/// resource still yields a record with an empty version. An install dir that
/// does not exist yields an empty inventory.
pub fn scan_install_dir(install_dir: &Path) -> Vec<DetectedDll> {
    let mut results = Vec::new();

    for entry in WalkDir::new(install_dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        let Some(kind) = classify(&file_name) else {
            continue;
        };

        let version = version_info::extract_file_version(entry.path()).unwrap_or_default();
        debug!(
            "found {} ({:?}) version {:?} at {:?}",
            file_name,
            kind,
            version,
            entry.path()
        );
        results.push(DetectedDll {
            name: file_name.to_string(),
            path: entry.path().to_path_buf(),
            version,
            kind,
        });
    }

    // Walk order is filesystem-dependent; make the inventory deterministic.
    results.sort_by(|a, b| a.path.cmp(&b.path));
    results
}
