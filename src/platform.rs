// Per-user directories for settings and the local database.
//
// Resolved through `dirs`, so the usual conventions apply on each OS
// (XDG on Linux, Application Support on macOS, %APPDATA% on Windows).

use std::path::PathBuf;

const APP_DIR: &str = "bookmark-sync";

/// Directory holding `settings.json`.
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Directory holding `bookmarks.db`.
pub fn get_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}
