pub mod store;
pub mod types;

pub use store::ProfileStore;
pub use types::{Profile, UpscalerMode, UpscalerPreset};
