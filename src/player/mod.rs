//! Fly-camera viewer for the demo host.
//!
//! Provides the `Player` marker plus the mouse-look and movement systems
//! that drive the camera the streaming scheduler follows.

pub mod camera;
pub mod movement;

use bevy::prelude::*;

pub use camera::*;
pub use movement::*;

/// Marker for the flying viewer camera.
#[derive(Component, Default)]
pub struct Player;
