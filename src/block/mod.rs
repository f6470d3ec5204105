//! Core block types and face directions.
//!
//! This module defines the block enumeration (`BlockType`), the per-cell
//! record stored in a chunk's grid (`Block`), and the six axis-aligned face
//! directions used by the mesher. The direction-to-unit-vector mapping is a
//! fixed contract: face tables, normals and neighbor stepping all index it.

use bevy::math::IVec3;

/// The kind of a block. `Air` is the unique empty variant; every other
/// variant is solid and can contribute faces to a chunk mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum BlockType {
    #[default]
    Air = 0,
    Grass = 1,
    Stone = 2,
}

impl BlockType {
    /// Whether this block type occupies its cell.
    #[must_use]
    pub fn is_solid(self) -> bool {
        !matches!(self, BlockType::Air)
    }

    /// Texture layer index forwarded to the renderer through the vertex
    /// color channel. Only meaningful for solid types (Air never reaches
    /// the mesher's emit path).
    #[must_use]
    pub fn texture_index(self) -> f32 {
        f32::from(self as u8) - 1.0
    }
}

/// One cell of a chunk's grid.
///
/// # Fields
/// * `kind` - the block type; `Air` contributes no faces
/// * `decoration_id` - opaque tag forwarded to the renderer, 0 = none
/// * `light` - per-vertex light channel in `[0, 15]`; reserved, carried
///   through the mesh but never written by a light pass
/// * `destroyable` - authoring hint; does not affect meshing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Block {
    pub kind: BlockType,
    pub decoration_id: u16,
    pub light: u8,
    pub destroyable: bool,
}

impl Block {
    /// A solid block of the given type with default metadata.
    #[must_use]
    pub fn solid(kind: BlockType) -> Self {
        Block {
            kind,
            decoration_id: 0,
            light: 0,
            destroyable: true,
        }
    }

    #[must_use]
    pub fn is_air(&self) -> bool {
        self.kind == BlockType::Air
    }
}

/// The six face directions of a cell. The declaration order is part of the
/// binary contract (it matches the vertex tables in `chunk::mesh`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceDirection {
    PosX,
    PosY,
    NegX,
    NegY,
    NegZ,
    PosZ,
}

impl FaceDirection {
    /// All six directions in contract order.
    pub const ALL: [FaceDirection; 6] = [
        FaceDirection::PosX,
        FaceDirection::PosY,
        FaceDirection::NegX,
        FaceDirection::NegY,
        FaceDirection::NegZ,
        FaceDirection::PosZ,
    ];

    /// Unit step toward the neighbor on this face. Z is the vertical axis.
    #[must_use]
    pub fn unit(self) -> IVec3 {
        match self {
            FaceDirection::PosX => IVec3::new(1, 0, 0),
            FaceDirection::PosY => IVec3::new(0, 1, 0),
            FaceDirection::NegX => IVec3::new(-1, 0, 0),
            FaceDirection::NegY => IVec3::new(0, -1, 0),
            FaceDirection::NegZ => IVec3::new(0, 0, -1),
            FaceDirection::PosZ => IVec3::new(0, 0, 1),
        }
    }
}
