use std::path::Path;

use config::{Config as ConfigSource, Environment, File};
use tracing::info;

use crate::error::Result;
use crate::models::Settings;

/// Loads `Settings` from, in increasing precedence: built-in defaults, an
/// optional TOML file, and `FETCHARR_`-prefixed environment variables.
/// Mirrors the teacher's `ferrex-config::loader` precedence order.
pub struct SettingsLoader;

impl SettingsLoader {
    pub fn load(config_path: Option<&Path>) -> Result<Settings> {
        // Best-effort: a `.env` file is a convenience for local/dev runs,
        // never required, matching the teacher's `dotenvy::dotenv()` call
        // at the top of its own settings loader.
        let _ = dotenvy::dotenv();

        let defaults = Settings::default();
        let mut builder = ConfigSource::builder()
            .set_default("server.host", defaults.server.host.clone())?
            .set_default("server.port", defaults.server.port as i64)?
            .set_default("database.url", defaults.database.url.clone())?
            .set_default(
                "retry_sweep_interval_seconds",
                defaults.retry_sweep_interval_seconds as i64,
            )?
            .set_default(
                "retry_sweep_page_size",
                defaults.retry_sweep_page_size as i64,
            )?
            .set_default(
                "activity_timeout_seconds",
                defaults.activity_timeout_seconds as i64,
            )?
            .set_default(
                "workflow_timeout_seconds",
                defaults.workflow_timeout_seconds as i64,
            )?
            .set_default(
                "max_concurrent_activities",
                defaults.max_concurrent_activities as i64,
            )?
            .set_default("log_level", defaults.log_level.clone())?
            .set_default("hard_reset", false)?;

        if let Some(path) = config_path {
            if path.exists() {
                info!(path = %path.display(), "loading configuration file");
                builder = builder.add_source(File::from(path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("FETCHARR")
                .separator("__")
                .try_parsing(true),
        );

        let raw = builder.build()?;
        let mut settings: Settings = raw.try_deserialize()?;

        if matches!(
            std::env::var("HARD_RESET").as_deref(),
            Ok("1") | Ok("true")
        ) {
            settings.hard_reset = true;
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_without_a_file() {
        let settings = SettingsLoader::load(None).expect("defaults load");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.retry_sweep_page_size, 10);
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fetcharr.toml");
        std::fs::write(
            &path,
            r#"
            log_level = "debug"
            retry_sweep_page_size = 25

            [server]
            port = 9090
            "#,
        )
        .expect("write config file");

        let settings = SettingsLoader::load(Some(&path)).expect("file load");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(settings.retry_sweep_page_size, 25);
        assert_eq!(settings.log_level, "debug");
        // untouched fields keep their defaults
        assert_eq!(settings.database.url, Settings::default().database.url);
    }
}
