//! Free-flight movement for the viewer camera.

use bevy::prelude::*;

use crate::player::Player;

const FLY_SPEED: f32 = 1200.0;
const FAST_MULTIPLIER: f32 = 4.0;

/// WASD flight on the camera's horizontal heading, Space/ControlLeft for
/// vertical, ShiftLeft to go fast. No collision; the viewer is a free camera.
#[allow(clippy::needless_pass_by_value)]
pub fn camera_movement(
    keyboard: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut query: Query<&mut Transform, With<Player>>,
) {
    let Ok(mut transform) = query.get_single_mut() else { return };

    let forward_raw = transform.forward();
    let forward = Vec3::new(forward_raw.x, 0.0, forward_raw.z).normalize_or_zero();
    let right_raw = transform.right();
    let right = Vec3::new(right_raw.x, 0.0, right_raw.z).normalize_or_zero();

    let mut dir = Vec3::ZERO;
    if keyboard.pressed(KeyCode::KeyW) {
        dir += forward;
    }
    if keyboard.pressed(KeyCode::KeyS) {
        dir -= forward;
    }
    if keyboard.pressed(KeyCode::KeyA) {
        dir -= right;
    }
    if keyboard.pressed(KeyCode::KeyD) {
        dir += right;
    }
    if keyboard.pressed(KeyCode::Space) {
        dir += Vec3::Y;
    }
    if keyboard.pressed(KeyCode::ControlLeft) {
        dir -= Vec3::Y;
    }

    if dir.length_squared() < 0.0001 {
        return;
    }

    let mut speed = FLY_SPEED;
    if keyboard.pressed(KeyCode::ShiftLeft) {
        speed *= FAST_MULTIPLIER;
    }
    transform.translation += dir.normalize() * speed * time.delta_seconds();
}
