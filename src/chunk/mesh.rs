//! Face extraction and mesh payload assembly.
//!
//! The mesher walks a chunk's potential set and emits one quad per
//! solid-to-air face. Neighbor air-ness inside the chunk always comes from
//! the grid; outside the chunk it depends on the build mode: `FastBuild`
//! answers from the height field (valid only while no edits have happened
//! anywhere, which is exactly the first-time build), `Authoritative` asks
//! the registry and treats anything non-resident as air so boundary faces
//! are emitted rather than leaving invisible holes. Vertical out-of-range
//! neighbors are air in both modes; chunks only tile horizontally.
//!
//! The potential set shrinks as a side effect: coords that turned to air or
//! emitted nothing are dropped, so repeated rebuilds touch less.

use bevy::math::IVec3;

use crate::block::{Block, FaceDirection};
use crate::error::EngineError;
use crate::terrain::HeightField;

use super::registry::ChunkRegistry;
use super::{Chunk, MeshState};

/// Neighbor-resolution mode for a mesh build, carrying its lookup source.
#[derive(Clone, Copy)]
pub enum MeshMode<'a> {
    /// Out-of-chunk neighbors answered by the height field. Cheap; used for
    /// the first build of a freshly generated chunk.
    FastBuild(&'a HeightField),
    /// Out-of-chunk neighbors answered through the registry; non-resident
    /// origins read as air.
    Authoritative(&'a ChunkRegistry),
}

/// Immutable bundle of vertex arrays handed to the renderer.
///
/// Four vertices and two triangles per face; `colors` channel 0 carries the
/// block's texture index, channel 1 the light value, channels 2 and 3 are
/// zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshPayload {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
}

impl MeshPayload {
    fn with_face_capacity(faces: usize) -> Self {
        MeshPayload {
            positions: Vec::with_capacity(faces * 4),
            normals: Vec::with_capacity(faces * 4),
            uvs: Vec::with_capacity(faces * 4),
            colors: Vec::with_capacity(faces * 4),
            indices: Vec::with_capacity(faces * 6),
        }
    }

    #[must_use]
    pub fn face_count(&self) -> usize {
        self.positions.len() / 4
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Corner offsets per face direction in half-edge units, in the fixed
/// emission order `(v0, v1, v2, v3)`. Triangles are `(v0, v1, v2)` and
/// `(v2, v1, v3)`; the order fronts the face along the direction's unit
/// vector once the host's mirrored axis mapping is applied (see `render`).
fn face_corners(dir: FaceDirection) -> [[f32; 3]; 4] {
    match dir {
        FaceDirection::PosX => [
            [1.0, 1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, 1.0],
            [1.0, -1.0, 1.0],
        ],
        FaceDirection::PosY => [
            [-1.0, 1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
        ],
        FaceDirection::NegX => [
            [-1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ],
        FaceDirection::NegY => [
            [1.0, -1.0, -1.0],
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, 1.0],
            [-1.0, -1.0, 1.0],
        ],
        FaceDirection::NegZ => [
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [1.0, -1.0, -1.0],
        ],
        FaceDirection::PosZ => [
            [1.0, 1.0, 1.0],
            [1.0, -1.0, 1.0],
            [-1.0, 1.0, 1.0],
            [-1.0, -1.0, 1.0],
        ],
    }
}

const FACE_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];

fn emit_face(out: &mut MeshPayload, center: [f32; 3], half: f32, dir: FaceDirection, block: &Block) {
    #[allow(clippy::cast_possible_truncation)]
    let base = out.positions.len() as u32;
    let normal = dir.unit().as_vec3();
    let color = [
        block.kind.texture_index(),
        f32::from(block.light),
        0.0,
        0.0,
    ];

    for corner in face_corners(dir) {
        out.positions.push([
            center[0] + corner[0] * half,
            center[1] + corner[1] * half,
            center[2] + corner[2] * half,
        ]);
        out.normals.push([normal.x, normal.y, normal.z]);
        out.colors.push(color);
    }
    out.uvs.extend_from_slice(&FACE_UVS);
    out.indices
        .extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
}

impl Chunk {
    /// Extract the surface mesh for this chunk.
    ///
    /// Iterates the potential set; every solid cell emits one face per air
    /// neighbor under the mode's resolution rules. Cells that are air or
    /// emitted nothing are removed from the potential set.
    ///
    /// # Errors
    /// `NoiseFailure` when a `FastBuild` neighbor probe fails; the caller
    /// evicts the chunk.
    pub fn build_mesh(&mut self, mode: MeshMode<'_>) -> Result<MeshPayload, EngineError> {
        let dims = self.grid.dims();
        let h = dims.height as i32;
        let origin = self.origin();
        let half = self.block_size / 2.0;

        let mut payload = MeshPayload::with_face_capacity(self.potential.len());
        let coords: Vec<IVec3> = self.potential.iter().copied().collect();

        for coord in coords {
            let block = match self.grid.get(coord) {
                Some(b) if !b.is_air() => b,
                _ => {
                    self.potential.remove(&coord);
                    continue;
                }
            };

            let center_v = self.cell_center(coord);
            let center = [center_v.x, center_v.y, center_v.z];
            let mut emitted = false;

            for dir in FaceDirection::ALL {
                let n = coord + dir.unit();
                let air = if n.z < 0 || n.z >= h {
                    true
                } else if dims.contains(n) {
                    self.grid.get(n).is_none_or(|b| b.is_air())
                } else {
                    match mode {
                        MeshMode::FastBuild(field) => {
                            #[allow(clippy::cast_precision_loss)]
                            let column = field.column_height(
                                origin.x + n.x as f32 * self.block_size,
                                origin.y + n.y as f32 * self.block_size,
                            )?;
                            n.z >= column
                        }
                        MeshMode::Authoritative(registry) => {
                            registry.neighbor_is_air(self.global_of(n))
                        }
                    }
                };

                if air {
                    emit_face(&mut payload, center, half, dir, &block);
                    emitted = true;
                }
            }

            if !emitted {
                self.potential.remove(&coord);
            }
        }

        self.mesh_state = MeshState::Ready;
        self.clear_dirty();
        Ok(payload)
    }
}
