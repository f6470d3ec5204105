//! Settings loading and hot-reloading.
//!
//! Settings are loaded from RON files in the `data/settings` directory. If
//! multiple files are present the first successfully parsed `Settings` wins;
//! if none parse, defaults are used. A filesystem watcher flips a flag when
//! the directory changes and `check_settings_changes` re-loads the resource.

use bevy::prelude::{Res, ResMut, Resource};

use crate::ron::{RonWatcher, load_ron_files, setup_ron_watcher};
use crate::settings::Settings;

pub const SETTINGS_DIR: &str = "data/settings";

#[derive(Resource)]
pub struct SettingsWatcher(pub RonWatcher);

impl SettingsWatcher {
    #[must_use]
    pub fn stub() -> Self {
        SettingsWatcher(RonWatcher::stub())
    }
}

/// Load settings from a directory of RON files, falling back to defaults.
#[must_use]
pub fn load_settings_from_dir(path: &str) -> Settings {
    let items: Vec<Settings> = load_ron_files(path);
    items.into_iter().next().unwrap_or_else(Settings::defaults)
}

/// Create the settings directory watcher.
///
/// # Errors
/// Propagates the `notify` error when the watch cannot be registered;
/// callers fall back to [`SettingsWatcher::stub`].
pub fn setup_settings_watcher(path: &str) -> Result<SettingsWatcher, notify::Error> {
    setup_ron_watcher(path).map(SettingsWatcher)
}

/// Reload the `Settings` resource when the watcher saw a change.
#[allow(clippy::needless_pass_by_value)]
pub fn check_settings_changes(watcher: Res<SettingsWatcher>, mut settings: ResMut<Settings>) {
    if watcher.0.take_changed() {
        bevy::log::info!("Settings changed, reloading...");
        *settings = load_settings_from_dir(SETTINGS_DIR);
    }
}
