use serde::{Deserialize, Serialize};

/// Upscaler quality tier forced onto a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpscalerMode {
    #[default]
    Off,
    UltraPerformance,
    Performance,
    Balanced,
    Quality,
    Dlaa,
}

/// Upscaler render preset. The lettered presets map to the driver's CNN
/// (A–F) and transformer (J–M) model generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpscalerPreset {
    #[default]
    #[serde(rename = "default")]
    Default,
    A,
    B,
    C,
    D,
    E,
    F,
    J,
    K,
    L,
    M,
}

/// Per-game override configuration.
///
/// Absent until explicitly saved; every save is a full overwrite. Decoding is
/// strict: unknown fields and out-of-range enum values are rejected so a
/// malformed file surfaces instead of silently collapsing to defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    /// Forced upscaler quality tier.
    pub sr_mode: UpscalerMode,
    /// Forced upscaler render preset.
    pub sr_preset: UpscalerPreset,
    /// Whether the upscaler override is applied at all.
    pub sr_override: bool,
    /// Frame generation on/off.
    pub fg_enabled: bool,
    /// Whether the frame-generation override is applied.
    pub fg_override: bool,
    /// Multi-frame generation factor (0 = driver default).
    pub multi_frame: u32,
    /// On-screen indicator overlay.
    pub indicator: bool,
    pub enable_hdr: bool,
    pub enable_wayland: bool,
    pub enable_ngx_updater: bool,
    /// Back up the game's DLLs when it launches.
    pub backup_on_launch: bool,
}
