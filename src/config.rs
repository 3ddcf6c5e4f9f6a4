use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use dirs_next::config_dir;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::api::DEFAULT_BASE_URL;

pub const DEFAULT_PLAYER: &str = "mpv";

/// Layered settings: built-in defaults, then the user's `settings.toml`,
/// then `SUKANIME_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub player: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            player: DEFAULT_PLAYER.to_string(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("api_base_url", DEFAULT_BASE_URL)?
            .set_default("player", DEFAULT_PLAYER)?;

        if let Some(path) = settings_path() {
            write_default_file_if_missing(&path);
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix("SUKANIME"))
            .build()
            .context("failed to load settings")?
            .try_deserialize()
            .context("failed to parse settings")?;

        Url::parse(&settings.api_base_url)
            .with_context(|| format!("api_base_url '{}' is not a valid URL", settings.api_base_url))?;
        Ok(settings)
    }
}

pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("sukanime").join("settings.toml"))
}

/// Seed the settings file with the defaults on first run so users have
/// something to edit. Best-effort.
fn write_default_file_if_missing(path: &Path) {
    if path.exists() {
        return;
    }
    let Ok(rendered) = toml::to_string_pretty(&Settings::default()) else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let _ = fs::write(path, rendered);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_public_api_and_mpv() {
        let settings = Settings::default();
        assert_eq!(settings.api_base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.player, "mpv");
        assert!(Url::parse(&settings.api_base_url).is_ok());
    }

    #[test]
    fn default_settings_round_trip_through_toml() {
        let rendered = toml::to_string_pretty(&Settings::default()).unwrap();
        let parsed: Settings = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.api_base_url, Settings::default().api_base_url);
        assert_eq!(parsed.player, Settings::default().player);
    }
}
