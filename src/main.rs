use bevy::prelude::*;
use bevy::window::{PresentMode, Window, WindowPlugin};

use cobble::chunk::streaming::ChunkManager;
use cobble::player::{camera_look, camera_movement, cursor_grab};
use cobble::render::ChunkEntities;
use cobble::settings::loader as settings_loader;

mod app;
use app::{block_interaction, drive_streaming, setup, sync_streaming_settings};

fn main() {
    let settings = settings_loader::load_settings_from_dir(settings_loader::SETTINGS_DIR);
    let settings_watcher = settings_loader::setup_settings_watcher(settings_loader::SETTINGS_DIR)
        .unwrap_or_else(|_| settings_loader::SettingsWatcher::stub());

    let manager = ChunkManager::new(settings.streaming_config());

    let mut app = App::new();

    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "cobble".to_string(),
            present_mode: PresentMode::AutoNoVsync,
            ..default()
        }),
        ..default()
    }));

    app.insert_resource(settings);
    app.insert_resource(settings_watcher);
    app.insert_resource(manager);
    app.insert_resource(ChunkEntities::default());

    app.add_systems(Startup, setup);
    app.add_systems(Update, drive_streaming);
    app.add_systems(Update, camera_look);
    app.add_systems(Update, camera_movement);
    app.add_systems(Update, cursor_grab);
    app.add_systems(Update, block_interaction);
    app.add_systems(Update, settings_loader::check_settings_changes);
    app.add_systems(Update, sync_streaming_settings);

    app.run();
}
