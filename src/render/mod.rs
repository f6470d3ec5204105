//! Bevy host integration for mesh payloads.
//!
//! `BevyMeshSink` turns the engine's payload arrays into `Mesh` assets and
//! keeps one entity per chunk, updating meshes in place instead of
//! respawning. The engine is Z-up while Bevy is Y-up; the axis mapping
//! `(x, y, z) -> (x, z, y)` lives here and nowhere else. The mapping mirrors
//! the space, so triangle index order is reversed to keep faces front-facing
//! under back-face culling.

use std::collections::HashMap;

use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

use crate::chunk::streaming::MeshSink;
use crate::chunk::{ChunkPos, MeshPayload};
use crate::error::EngineError;

/// Marker for spawned chunk entities.
#[derive(Component)]
pub struct ChunkEntity {
    pub chunk_x: i32,
    pub chunk_y: i32,
}

/// Tracks spawned chunk entities and their mesh handles so payload updates
/// can replace meshes in place.
#[derive(Resource, Default)]
pub struct ChunkEntities {
    pub map: HashMap<ChunkPos, (Entity, Handle<Mesh>)>,
}

/// Display colors per texture index for the untextured demo material;
/// channel 0 of the payload's vertex color selects the entry.
const PALETTE: [[f32; 4]; 2] = [
    [0.33, 0.55, 0.25, 1.0], // grass
    [0.52, 0.52, 0.55, 1.0], // stone
];

/// Convert a payload into a renderable mesh.
///
/// Vertex positions and normals are remapped into Bevy's Y-up space and the
/// metadata color channel is resolved against the demo palette (the light
/// channel is carried by the payload but not shaded here).
#[must_use]
pub fn payload_to_mesh(payload: &MeshPayload) -> Mesh {
    let positions: Vec<[f32; 3]> = payload
        .positions
        .iter()
        .map(|p| [p[0], p[2], p[1]])
        .collect();
    let normals: Vec<[f32; 3]> = payload
        .normals
        .iter()
        .map(|n| [n[0], n[2], n[1]])
        .collect();
    let colors: Vec<[f32; 4]> = payload
        .colors
        .iter()
        .map(|c| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let index = c[0].max(0.0) as usize;
            *PALETTE.get(index).unwrap_or(&[1.0, 1.0, 1.0, 1.0])
        })
        .collect();

    let mut indices = Vec::with_capacity(payload.indices.len());
    for tri in payload.indices.chunks_exact(3) {
        indices.extend_from_slice(&[tri[0], tri[2], tri[1]]);
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, payload.uvs.clone());
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

/// Mesh sink writing into Bevy assets and entities. Borrowed per tick from
/// the driving system's params.
pub struct BevyMeshSink<'a, 'w, 's> {
    pub commands: &'a mut Commands<'w, 's>,
    pub meshes: &'a mut Assets<Mesh>,
    pub material: Handle<StandardMaterial>,
    pub entities: &'a mut ChunkEntities,
}

impl BevyMeshSink<'_, '_, '_> {
    fn despawn(&mut self, pos: ChunkPos) {
        if let Some((entity, handle)) = self.entities.map.remove(&pos) {
            self.commands.entity(entity).despawn();
            self.meshes.remove(&handle);
        }
    }
}

impl MeshSink for BevyMeshSink<'_, '_, '_> {
    fn apply(&mut self, pos: ChunkPos, payload: &MeshPayload) -> Result<(), EngineError> {
        // A payload with no faces means a fully hidden chunk: keep the data
        // resident but spawn nothing visible.
        if payload.is_empty() {
            self.despawn(pos);
            return Ok(());
        }

        let mesh = payload_to_mesh(payload);
        if let Some((_, handle)) = self.entities.map.get(&pos) {
            self.meshes.insert(handle.id(), mesh);
        } else {
            let handle = self.meshes.add(mesh);
            let entity = self
                .commands
                .spawn((
                    PbrBundle {
                        mesh: handle.clone(),
                        material: self.material.clone(),
                        ..default()
                    },
                    ChunkEntity {
                        chunk_x: pos.x,
                        chunk_y: pos.y,
                    },
                ))
                .id();
            self.entities.map.insert(pos, (entity, handle));
        }
        Ok(())
    }

    fn remove(&mut self, pos: ChunkPos) {
        self.despawn(pos);
    }
}
