//! Demo host systems: world setup, the per-frame streaming driver, settings
//! sync and click edits.
//!
//! Everything here is glue between Bevy and the engine core: the core knows
//! nothing about entities, assets or input. The camera lives in Bevy's Y-up
//! space; positions handed to the engine go through `to_engine_space`.

use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use cobble::block::BlockType;
use cobble::chunk::global_cell_of_world;
use cobble::chunk::streaming::{ChunkManager, Viewer};
use cobble::player::{Player, PlayerLook};
use cobble::render::{BevyMeshSink, ChunkEntities};
use cobble::settings::Settings;

/// Shared material for all chunk entities.
#[derive(Resource)]
pub struct TerrainMaterial(pub Handle<StandardMaterial>);

/// Reach of click edits, in blocks.
const EDIT_RANGE_BLOCKS: f32 = 6.0;

/// Bevy Y-up to engine Z-up.
fn to_engine_space(v: Vec3) -> Vec3 {
    Vec3::new(v.x, v.z, v.y)
}

struct CameraViewer(Vec3);

impl Viewer for CameraViewer {
    fn current_position(&self) -> Vec3 {
        self.0
    }
}

/// Spawn the camera, lights and the shared terrain material.
pub fn setup(
    mut commands: Commands,
    mut materials: ResMut<Assets<StandardMaterial>>,
    settings: Res<Settings>,
) {
    let material = materials.add(StandardMaterial {
        base_color: Color::WHITE,
        perceptual_roughness: 0.9,
        ..default()
    });
    commands.insert_resource(TerrainMaterial(material));

    // Start above the tallest possible column, looking gently down.
    #[allow(clippy::cast_precision_loss)]
    let start_height = (settings.terrain.max_height + 6) as f32 * settings.terrain.block_size;
    let look = PlayerLook {
        yaw: 0.0,
        pitch: -0.5,
    };
    commands.spawn((
        Camera3dBundle {
            transform: Transform::from_xyz(0.0, start_height, 0.0)
                .with_rotation(Quat::from_euler(EulerRot::YXZ, look.yaw, look.pitch, 0.0)),
            ..default()
        },
        Player,
        look,
    ));

    commands.spawn(DirectionalLightBundle {
        directional_light: DirectionalLight {
            illuminance: 9_000.0,
            shadows_enabled: false,
            ..default()
        },
        transform: Transform::from_rotation(Quat::from_euler(EulerRot::XYZ, -0.9, 0.4, 0.0)),
        ..default()
    });
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 250.0,
    });
}

/// Tick the streaming scheduler once per frame with the camera as viewer.
#[allow(clippy::needless_pass_by_value)]
pub fn drive_streaming(
    mut commands: Commands,
    mut manager: ResMut<ChunkManager>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut entities: ResMut<ChunkEntities>,
    material: Option<Res<TerrainMaterial>>,
    camera: Query<&GlobalTransform, With<Player>>,
) {
    let Some(material) = material else { return };
    let Ok(cam) = camera.get_single() else { return };

    let viewer = CameraViewer(to_engine_space(cam.translation()));
    let mut sink = BevyMeshSink {
        commands: &mut commands,
        meshes: &mut meshes,
        material: material.0.clone(),
        entities: &mut entities,
    };
    manager.tick(&viewer, &mut sink);
}

/// Push changed settings into the scheduler.
#[allow(clippy::needless_pass_by_value)]
pub fn sync_streaming_settings(settings: Res<Settings>, mut manager: ResMut<ChunkManager>) {
    if settings.is_changed() {
        manager.update_config(&settings.streaming_config());
    }
}

/// Left click removes the targeted block, right click places stone against
/// it. Targeting is a short step-raycast against the resident chunks.
#[allow(clippy::needless_pass_by_value)]
pub fn block_interaction(
    mut commands: Commands,
    mut manager: ResMut<ChunkManager>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut entities: ResMut<ChunkEntities>,
    material: Option<Res<TerrainMaterial>>,
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    camera: Query<&GlobalTransform, With<Player>>,
) {
    let Ok(window) = windows.get_single() else { return };
    if window.cursor.visible {
        // The grab click should not edit terrain.
        return;
    }
    let removing = mouse.just_pressed(MouseButton::Left);
    let placing = mouse.just_pressed(MouseButton::Right);
    if !removing && !placing {
        return;
    }
    let Some(material) = material else { return };
    let Ok(cam) = camera.get_single() else { return };

    let origin = to_engine_space(cam.translation());
    let dir = to_engine_space(Vec3::from(cam.forward())).normalize_or_zero();
    let block_size = manager.config().block_size;

    let step = dir * (block_size * 0.1);
    let mut point = origin;
    let mut last_air = origin;
    let mut hit = None;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    for _ in 0..(EDIT_RANGE_BLOCKS * 10.0) as usize {
        point += step;
        if manager
            .registry()
            .neighbor_is_air(global_cell_of_world(point, block_size))
        {
            last_air = point;
        } else {
            hit = Some(point);
            break;
        }
    }
    let Some(hit_point) = hit else { return };

    let mut sink = BevyMeshSink {
        commands: &mut commands,
        meshes: &mut meshes,
        material: material.0.clone(),
        entities: &mut entities,
    };
    let result = if removing {
        manager.remove_block(hit_point, &mut sink)
    } else {
        manager.add_block(last_air, BlockType::Stone, &mut sink)
    };
    if let Err(err) = result {
        warn!("block edit failed: {err}");
    }
}
