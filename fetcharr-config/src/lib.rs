//! Settings loading (file + environment) and CLI argument parsing for the
//! Fetcharr server binary.

pub mod cli;
pub mod error;
pub mod loader;
pub mod models;

pub use cli::Args;
pub use error::{ConfigError, Result};
pub use loader::SettingsLoader;
pub use models::{
    ContentSourceSettings, DatabaseSettings, DownloaderSettings, PostProcessingSettings,
    ServerSettings, Settings,
};
