//! Chunk data, terrain generation, and local edits.
//!
//! A `Chunk` owns one `BlockGrid` plus the working set of cells that might
//! currently contribute faces (the potential set). Generation fills the grid
//! from the height field and seeds the potential set with the fast
//! air-adjacency test; edits repair the potential set incrementally across
//! the 26-neighborhood so a rebuild never has to rescan the whole grid.
//!
//! Chunks are plain data: they hold no reference to the registry or the
//! scheduler. Neighbor lookups during meshing receive the registry as an
//! explicit parameter (see `chunk::mesh`), and cross-chunk repairs from an
//! edit are returned to the caller to route.

use std::collections::HashSet;

use bevy::math::{IVec3, Vec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::block::{Block, BlockType};
use crate::error::EngineError;
use crate::terrain::HeightField;

pub mod grid;
pub mod mesh;
pub mod pool;
pub mod registry;
pub mod stats;
pub mod streaming;

pub use grid::{BlockGrid, ChunkDims};
pub use mesh::{MeshMode, MeshPayload};
pub use pool::ChunkPool;
pub use registry::ChunkRegistry;
pub use stats::MeshStats;
pub use streaming::{ChunkManager, MeshSink, Viewer};

/// Chunk grid coordinate in the horizontal plane. The chunk's world origin
/// (the center of its cell `(0, 0, 0)`) is `pos * width * block_size`;
/// chunks tile in X/Y only, the world is one chunk tall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
}

impl ChunkPos {
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        ChunkPos { x, y }
    }

    /// World position of this chunk's cell `(0, 0, 0)` center.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn origin(self, width: u32, block_size: f32) -> Vec3 {
        let span = width as f32 * block_size;
        Vec3::new(self.x as f32 * span, self.y as f32 * span, 0.0)
    }

    /// The chunk containing a world position.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn of_world(pos: Vec3, width: u32, block_size: f32) -> Self {
        let span = width as f32 * block_size;
        ChunkPos {
            x: (pos.x / span).floor() as i32,
            y: (pos.y / span).floor() as i32,
        }
    }

    /// The chunk owning a global cell coordinate.
    #[must_use]
    pub fn of_global_cell(cell: IVec3, width: u32) -> Self {
        let w = width as i32;
        ChunkPos {
            x: cell.x.div_euclid(w),
            y: cell.y.div_euclid(w),
        }
    }
}

/// Global cell index of a world position: `floor(world / block_size)` on each
/// axis.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn global_cell_of_world(pos: Vec3, block_size: f32) -> IVec3 {
    IVec3::new(
        (pos.x / block_size).floor() as i32,
        (pos.y / block_size).floor() as i32,
        (pos.z / block_size).floor() as i32,
    )
}

/// Local coordinate of a global cell within its owning chunk.
#[must_use]
pub fn local_of_global_cell(cell: IVec3, width: u32) -> IVec3 {
    let w = width as i32;
    IVec3::new(cell.x.rem_euclid(w), cell.y.rem_euclid(w), cell.z)
}

/// Mesh lifecycle of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeshState {
    /// Grid populated (or cleared), no mesh built yet.
    #[default]
    Empty,
    /// A mesh build owns the chunk on a background worker.
    Building,
    /// The latest mesh has been handed to the sink.
    Ready,
}

/// A fixed-size 3D region of blocks managed as one unit.
#[derive(Debug, Clone)]
pub struct Chunk {
    pos: ChunkPos,
    block_size: f32,
    grid: BlockGrid,
    potential: HashSet<IVec3>,
    mesh_state: MeshState,
    dirty: bool,
}

impl Chunk {
    /// Create a chunk at `(0, 0)` with an all-air grid. Pooled chunks are
    /// constructed once through this and then recycled via `clear`.
    #[must_use]
    pub fn new(dims: ChunkDims, block_size: f32) -> Self {
        Chunk {
            pos: ChunkPos::new(0, 0),
            block_size,
            grid: BlockGrid::new(dims),
            potential: HashSet::new(),
            mesh_state: MeshState::Empty,
            dirty: false,
        }
    }

    #[must_use]
    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Re-home a recycled chunk at a new grid position.
    pub fn set_pos(&mut self, pos: ChunkPos) {
        self.pos = pos;
    }

    #[must_use]
    pub fn dims(&self) -> ChunkDims {
        self.grid.dims()
    }

    #[must_use]
    pub fn block_size(&self) -> f32 {
        self.block_size
    }

    /// World position of cell `(0, 0, 0)`'s center.
    #[must_use]
    pub fn origin(&self) -> Vec3 {
        self.pos.origin(self.grid.dims().width, self.block_size)
    }

    /// World position of a local cell's center.
    #[must_use]
    pub fn cell_center(&self, coord: IVec3) -> Vec3 {
        self.origin() + coord.as_vec3() * self.block_size
    }

    /// Global cell index of a local coordinate.
    #[must_use]
    pub fn global_of(&self, coord: IVec3) -> IVec3 {
        let w = self.grid.dims().width as i32;
        IVec3::new(self.pos.x * w + coord.x, self.pos.y * w + coord.y, coord.z)
    }

    #[must_use]
    pub fn block_at(&self, coord: IVec3) -> Option<Block> {
        self.grid.get(coord)
    }

    #[must_use]
    pub fn grid(&self) -> &BlockGrid {
        &self.grid
    }

    #[must_use]
    pub fn mesh_state(&self) -> MeshState {
        self.mesh_state
    }

    pub(crate) fn set_mesh_state(&mut self, state: MeshState) {
        self.mesh_state = state;
    }

    /// Whether an edit in a neighboring chunk invalidated this chunk's mesh.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Number of cells currently in the potential set.
    #[must_use]
    pub fn potential_len(&self) -> usize {
        self.potential.len()
    }

    /// Insert a cell into the potential set (cross-chunk edit repair).
    pub fn add_potential_block(&mut self, coord: IVec3) {
        if self.grid.dims().contains(coord) {
            self.potential.insert(coord);
        }
    }

    /// Reset all state so the chunk can be reused from the pool. Grid storage
    /// is retained.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.potential.clear();
        self.mesh_state = MeshState::Empty;
        self.dirty = false;
    }

    /// Populate the grid from the height field.
    ///
    /// Every cell at `iz >= column_height` is air; solid cells pick Stone or
    /// Grass with an RNG seeded from the global cell coordinate, so the same
    /// `(seed, pos, dims, block_size)` always regenerates an identical grid.
    /// Afterwards the potential set holds every solid cell with at least one
    /// air neighbor under the fast column test.
    ///
    /// # Errors
    /// `NoiseFailure` when the height field fails; the grid is left cleared
    /// and the caller evicts the chunk.
    pub fn generate(&mut self, height_field: &HeightField, seed: u32) -> Result<(), EngineError> {
        let dims = self.grid.dims();
        let w = dims.width as i32;
        let h = dims.height as i32;
        let origin = self.origin();

        // Column heights for this chunk plus a one-cell apron, so the fast
        // adjacency test below never re-samples the noise.
        let apron = (w + 2) as usize;
        let mut heights = vec![0i32; apron * apron];
        for iy in -1..=w {
            for ix in -1..=w {
                #[allow(clippy::cast_precision_loss)]
                let height = height_field.column_height(
                    origin.x + ix as f32 * self.block_size,
                    origin.y + iy as f32 * self.block_size,
                )?;
                heights[(ix + 1) as usize + (iy + 1) as usize * apron] = height;
            }
        }
        let column = |x: i32, y: i32| heights[(x + 1) as usize + (y + 1) as usize * apron];

        for iy in 0..w {
            for ix in 0..w {
                let top = column(ix, iy);
                for iz in 0..top.min(h) {
                    let coord = IVec3::new(ix, iy, iz);
                    let kind = pick_solid_kind(seed, self.global_of(coord));
                    self.grid.set(coord, Block::solid(kind))?;
                }
            }
        }

        // Fast air-adjacency: a neighbor is air when it is above its column
        // or outside the vertical world bounds. Cross-chunk neighbors are
        // answered from the apron columns, never from another chunk's grid.
        self.potential.clear();
        let cell_is_air = |c: IVec3| c.z < 0 || c.z >= h || c.z >= column(c.x, c.y);
        for iy in 0..w {
            for ix in 0..w {
                for iz in 0..column(ix, iy).min(h) {
                    let coord = IVec3::new(ix, iy, iz);
                    let exposed = crate::block::FaceDirection::ALL
                        .iter()
                        .any(|d| cell_is_air(coord + d.unit()));
                    if exposed {
                        self.potential.insert(coord);
                    }
                }
            }
        }

        self.mesh_state = MeshState::Empty;
        self.dirty = false;
        Ok(())
    }

    /// Change one block and repair the potential set.
    ///
    /// The edited cell and its in-chunk 26-neighborhood join the potential
    /// set; the out-of-chunk members are returned as global cell coordinates
    /// for the caller to route into the owning chunks through the registry.
    ///
    /// # Errors
    /// `OutOfBounds` when `coord` is outside the grid; nothing is changed.
    pub fn modify_block(
        &mut self,
        coord: IVec3,
        new_kind: BlockType,
    ) -> Result<Vec<IVec3>, EngineError> {
        let mut block = self
            .grid
            .get(coord)
            .ok_or(EngineError::OutOfBounds(coord))?;
        block.kind = new_kind;
        if new_kind == BlockType::Air {
            block.decoration_id = 0;
        }
        self.grid.set(coord, block)?;

        self.potential.insert(coord);

        let dims = self.grid.dims();
        let h = dims.height as i32;
        let mut foreign = Vec::new();
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let n = coord + IVec3::new(dx, dy, dz);
                    if dims.contains(n) {
                        self.potential.insert(n);
                    } else if (0..h).contains(&n.z) {
                        // Horizontal spill into a neighboring chunk. Vertical
                        // overflow has no owner: the world is one chunk tall.
                        foreign.push(self.global_of(n));
                    }
                }
            }
        }
        Ok(foreign)
    }
}

/// Deterministic Stone/Grass pick for a solid cell, seeded from the global
/// cell coordinate and the world seed.
fn pick_solid_kind(seed: u32, global: IVec3) -> BlockType {
    let mut s = u64::from(seed) ^ 0x9E37_79B9_7F4A_7C15;
    for c in [global.x, global.y, global.z] {
        s ^= (c as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        s = s.rotate_left(23).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    }
    let mut rng = ChaCha8Rng::seed_from_u64(s);
    if rng.random_bool(0.5) {
        BlockType::Stone
    } else {
        BlockType::Grass
    }
}
