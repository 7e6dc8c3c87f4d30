//! SwapDeck: the host-side core of a Steam/Proton graphics-override manager.
//!
//! The crate scans Steam libraries for installed games, inventories their
//! upscaler / frame-generation DLLs, checks installed versions against a
//! published manifest, applies overrides with backup/restore protection,
//! stores per-game profiles, and samples GPU/CPU telemetry. A presentation
//! shell embeds [`App`] and maps its UI calls onto the methods there.

pub mod app;
pub mod config;
pub mod dll;
pub mod error;
pub mod game;
pub mod paths;
pub mod profile;
pub mod steam;
pub mod telemetry;

pub use app::{App, DllUpdateInfo, GameInfo};
pub use config::Settings;
pub use dll::installer::{FileOutcome, UpdateReport};
pub use error::{Error, Result};
pub use game::{DetectedDll, DllKind, Game};
pub use paths::AppPaths;
pub use profile::{Profile, UpscalerMode, UpscalerPreset};
pub use steam::library::ScanReport;
pub use telemetry::{CpuSnapshot, GpuSnapshot};

/// Initialize tracing for embedding shells and tools.
///
/// Respects `RUST_LOG`; defaults to `info`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
