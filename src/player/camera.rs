//! Camera control and cursor helpers.
//!
//! `camera_look` accumulates mouse motion for the current update and applies
//! yaw/pitch to the player's transform; `cursor_grab` locks the cursor on
//! click and releases it on Escape.

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, PrimaryWindow};

use crate::player::Player;

const CAMERA_MAX_PITCH_DEG: f32 = 85.0;
const MOUSE_SENSITIVITY: f32 = 0.000_12;

/// Look orientation (yaw and pitch) in radians.
#[derive(Component, Default)]
pub struct PlayerLook {
    pub yaw: f32,
    pub pitch: f32,
}

impl PlayerLook {
    /// Apply a raw mouse delta, clamping pitch to a safe range.
    pub fn apply_delta(&mut self, delta: Vec2) {
        let max_pitch = CAMERA_MAX_PITCH_DEG.to_radians();
        self.yaw -= delta.x * MOUSE_SENSITIVITY;
        self.pitch = (self.pitch - delta.y * MOUSE_SENSITIVITY).clamp(-max_pitch, max_pitch);
    }
}

/// Apply mouse-look to the player camera while the cursor is grabbed.
#[allow(clippy::needless_pass_by_value)]
pub fn camera_look(
    windows: Query<&Window, With<PrimaryWindow>>,
    motion_events: Res<Events<MouseMotion>>,
    mut query: Query<(&mut Transform, &mut PlayerLook), With<Player>>,
) {
    let mut delta = Vec2::ZERO;
    for ev in motion_events.iter_current_update_events() {
        delta += ev.delta;
    }
    if delta == Vec2::ZERO {
        return;
    }

    let Ok(window) = windows.get_single() else { return };
    if window.cursor.visible {
        return;
    }

    for (mut transform, mut look) in &mut query {
        look.apply_delta(delta);
        transform.rotation = Quat::from_euler(EulerRot::YXZ, look.yaw, look.pitch, 0.0);
    }
}

/// Grab the cursor on left click, release on Escape.
#[allow(clippy::needless_pass_by_value)]
pub fn cursor_grab(
    mut windows: Query<&mut Window, With<PrimaryWindow>>,
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
) {
    let Ok(mut window) = windows.get_single_mut() else { return };

    if mouse.just_pressed(MouseButton::Left) && window.cursor.visible {
        window.cursor.grab_mode = CursorGrabMode::Locked;
        window.cursor.visible = false;
    }
    if keyboard.just_pressed(KeyCode::Escape) {
        window.cursor.grab_mode = CursorGrabMode::None;
        window.cursor.visible = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_is_clamped() {
        let mut look = PlayerLook::default();
        look.apply_delta(Vec2::new(0.0, -1.0e9));
        assert!(look.pitch <= CAMERA_MAX_PITCH_DEG.to_radians() + f32::EPSILON);
        look.apply_delta(Vec2::new(0.0, 1.0e9));
        assert!(look.pitch >= -CAMERA_MAX_PITCH_DEG.to_radians() - f32::EPSILON);
    }
}
