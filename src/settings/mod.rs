//! Settings, types and defaults.
//!
//! Settings are stored as a RON file under `data/settings/` and are
//! hot-reloadable through the RON watcher utilities (see
//! `ron::setup_ron_watcher`). Every field carries a serde default so partial
//! files stay valid as options are added.

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::chunk::streaming::StreamingConfig;

/// Terrain shape and generation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainSettings {
    #[serde(default = "TerrainSettings::default_draw_distance")]
    pub draw_distance: u32, // Radius in chunks kept resident around the viewer.
    #[serde(default = "TerrainSettings::default_block_size")]
    pub block_size: f32, // World units per cell edge.
    #[serde(default = "TerrainSettings::default_chunk_width")]
    pub chunk_width: u32, // Chunk width in cells (square in plan).
    #[serde(default = "TerrainSettings::default_chunk_height")]
    pub chunk_height: u32, // Chunk height in cells (the vertical axis).
    #[serde(default = "TerrainSettings::default_min_height")]
    pub min_height: i32, // Lowest column height the noise can produce.
    #[serde(default = "TerrainSettings::default_max_height")]
    pub max_height: i32, // Highest column height the noise can produce.
    #[serde(default = "TerrainSettings::default_noise_scale")]
    pub noise_scale: f32, // World units per noise unit.
    #[serde(default = "TerrainSettings::default_seed")]
    pub seed: u32, // World seed for the noise and block-type choice.
}

impl TerrainSettings {
    fn default_draw_distance() -> u32 { 4 }
    fn default_block_size() -> f32 { 100.0 }
    fn default_chunk_width() -> u32 { 32 }
    fn default_chunk_height() -> u32 { 32 }
    fn default_min_height() -> i32 { 6 }
    fn default_max_height() -> i32 { 32 }
    fn default_noise_scale() -> f32 { 100.0 }
    fn default_seed() -> u32 { 1337 }
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            draw_distance: Self::default_draw_distance(),
            block_size: Self::default_block_size(),
            chunk_width: Self::default_chunk_width(),
            chunk_height: Self::default_chunk_height(),
            min_height: Self::default_min_height(),
            max_height: Self::default_max_height(),
            noise_scale: Self::default_noise_scale(),
            seed: Self::default_seed(),
        }
    }
}

/// Per-tick scheduler limits before backlog adaptation takes over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "SchedulerSettings::default_max_chunks_per_tick")]
    pub max_chunks_per_tick: u32, // Generation dispatches per tick.
    #[serde(default = "SchedulerSettings::default_max_meshes_per_tick")]
    pub max_meshes_per_tick: u32, // Mesh-build dispatches per tick.
}

impl SchedulerSettings {
    fn default_max_chunks_per_tick() -> u32 { 8 }
    fn default_max_meshes_per_tick() -> u32 { 8 }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_chunks_per_tick: Self::default_max_chunks_per_tick(),
            max_meshes_per_tick: Self::default_max_meshes_per_tick(),
        }
    }
}

/// Top-level settings.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub terrain: TerrainSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            terrain: TerrainSettings::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn defaults() -> Self {
        Settings::default()
    }

    /// The streaming configuration these settings describe.
    #[must_use]
    pub fn streaming_config(&self) -> StreamingConfig {
        StreamingConfig {
            draw_distance: self.terrain.draw_distance,
            block_size: self.terrain.block_size,
            chunk_width: self.terrain.chunk_width,
            chunk_height: self.terrain.chunk_height,
            max_chunks_per_tick: self.scheduler.max_chunks_per_tick,
            max_meshes_per_tick: self.scheduler.max_meshes_per_tick,
            height_range: (self.terrain.min_height, self.terrain.max_height),
            noise_scale: self.terrain.noise_scale,
            seed: self.terrain.seed,
        }
    }
}

pub mod loader;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_streaming_defaults() {
        let config = Settings::defaults().streaming_config();
        assert_eq!(config, StreamingConfig::default());
    }

    #[test]
    fn partial_ron_files_fall_back_per_field() {
        let settings: Settings =
            ron::from_str("(terrain: (draw_distance: 2, seed: 9))").unwrap();
        assert_eq!(settings.terrain.draw_distance, 2);
        assert_eq!(settings.terrain.seed, 9);
        assert_eq!(settings.terrain.chunk_width, 32);
        assert_eq!(settings.scheduler.max_chunks_per_tick, 8);
    }

    #[test]
    fn settings_round_trip_through_ron() {
        let mut settings = Settings::defaults();
        settings.terrain.draw_distance = 6;
        settings.scheduler.max_meshes_per_tick = 3;
        let text = ron::to_string(&settings).unwrap();
        let back: Settings = ron::from_str(&text).unwrap();
        assert_eq!(back.terrain.draw_distance, 6);
        assert_eq!(back.scheduler.max_meshes_per_tick, 3);
    }
}
