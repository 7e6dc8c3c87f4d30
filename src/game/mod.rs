pub mod database;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a detected graphics-override DLL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DllKind {
    Upscaler,
    FrameGeneration,
    RayReconstruction,
    Other,
}

/// One graphics DLL found inside a game's install directory.
///
/// Owned by its [`Game`] and recomputed on every scan. `version` is empty when
/// the file carries no readable version resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedDll {
    pub name: String,
    pub path: PathBuf,
    pub version: String,
    pub kind: DllKind,
}

/// An installed Steam game as discovered by the last scan.
///
/// Identity is the app id; everything else is immutable until the next scan
/// replaces the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub app_id: u64,
    pub name: String,
    pub install_dir: PathBuf,
    pub library_path: PathBuf,
    /// Proton prefix path, when the game has a valid compat-data directory.
    pub prefix_path: Option<PathBuf>,
    pub dlls: Vec<DetectedDll>,
    pub scanned_at: DateTime<Utc>,
}

/// Steam tooling (Proton builds, runtimes, redistributables) shows up in the
/// library like a game; listings filter these by name.
pub fn is_tool_name(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    name.starts_with("proton")
        || name.starts_with("steam linux runtime")
        || name.starts_with("steamworks")
        || name.starts_with("steam controller")
        || name.contains("redistributable")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_are_recognized() {
        assert!(is_tool_name("Proton 9.0"));
        assert!(is_tool_name("Proton"));
        assert!(is_tool_name("Steam Linux Runtime 3.0 (sniper)"));
        assert!(is_tool_name("Steamworks Common Redistributables"));
        assert!(is_tool_name("  steam controller configs"));
    }

    #[test]
    fn game_names_are_not_tools() {
        assert!(!is_tool_name("Cyberpunk 2077"));
        assert!(!is_tool_name("ELDEN RING"));
        // "proton" must lead the name, not merely appear in it.
        assert!(!is_tool_name("Half-Life: Proton Mod"));
    }
}
