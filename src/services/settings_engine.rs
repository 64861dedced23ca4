// Settings Engine
// Loads and saves application settings.
// Settings are stored as a JSON file at the platform-specific config path; a
// handful of environment variables override the file at read time.

use std::fs;
use std::path::Path;

use crate::platform;
use crate::types::errors::SettingsError;
use crate::types::settings::AppSettings;

pub const ENV_BACKEND_URL: &str = "BOOKMARKS_BACKEND_URL";
pub const ENV_ANON_KEY: &str = "BOOKMARKS_ANON_KEY";
pub const ENV_REDIRECT_URL: &str = "BOOKMARKS_REDIRECT_URL";
pub const ENV_DATA_DIR: &str = "BOOKMARKS_DATA_DIR";

/// Trait defining the settings engine interface.
pub trait SettingsEngineTrait {
    fn load(&mut self) -> Result<AppSettings, SettingsError>;
    fn save(&self) -> Result<(), SettingsError>;
    fn get_settings(&self) -> &AppSettings;
    fn get_config_path(&self) -> &str;
}

/// Settings engine implementation that persists settings as JSON on disk.
pub struct SettingsEngine {
    config_path: String,
    settings: AppSettings,
}

impl SettingsEngine {
    /// Creates a new SettingsEngine.
    ///
    /// If `path_override` is `Some`, uses that path for the config file.
    /// Otherwise, uses the platform config directory with `settings.json`.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = match path_override {
            Some(p) => p,
            None => platform::get_config_dir()
                .join("settings.json")
                .to_string_lossy()
                .to_string(),
        };

        Self {
            config_path,
            settings: AppSettings::default(),
        }
    }

    /// The loaded settings with process environment overrides applied.
    ///
    /// Overrides are never written back by [`SettingsEngineTrait::save`].
    pub fn effective(&self) -> AppSettings {
        apply_env_overrides(self.settings.clone(), |name| std::env::var(name).ok())
    }
}

/// Applies the `BOOKMARKS_*` overrides found through `lookup`. Empty values are ignored.
pub fn apply_env_overrides<F>(mut settings: AppSettings, lookup: F) -> AppSettings
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = get(ENV_BACKEND_URL) {
        settings.backend.url = url;
    }
    if let Some(key) = get(ENV_ANON_KEY) {
        settings.backend.anon_key = key;
    }
    if let Some(redirect) = get(ENV_REDIRECT_URL) {
        settings.backend.redirect_url = redirect;
    }
    if let Some(dir) = get(ENV_DATA_DIR) {
        settings.storage.database_path = Some(
            Path::new(&dir)
                .join("bookmarks.db")
                .to_string_lossy()
                .to_string(),
        );
    }
    settings
}

impl SettingsEngineTrait for SettingsEngine {
    /// Loads settings from the JSON config file.
    ///
    /// If the file does not exist, returns default settings.
    /// If the file exists but is malformed, returns a serialization error.
    fn load(&mut self) -> Result<AppSettings, SettingsError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            self.settings = AppSettings::default();
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| SettingsError::IoError(format!("Failed to read config file: {}", e)))?;

        self.settings = serde_json::from_str(&content).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;
        Ok(self.settings.clone())
    }

    /// Saves the current settings to the JSON config file, creating parent directories.
    fn save(&self) -> Result<(), SettingsError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SettingsError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.settings).map_err(|e| {
            SettingsError::SerializationError(format!("Failed to serialize settings: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| SettingsError::IoError(format!("Failed to write config file: {}", e)))
    }

    fn get_settings(&self) -> &AppSettings {
        &self.settings
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
