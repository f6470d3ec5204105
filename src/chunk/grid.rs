//! Dense per-chunk block storage.

use bevy::math::IVec3;

use crate::block::Block;
use crate::error::EngineError;

/// Chunk shape in cells: square in plan (`width` × `width`), `height` tall.
/// Z is the vertical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDims {
    pub width: u32,
    pub height: u32,
}

impl ChunkDims {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        ChunkDims { width, height }
    }

    /// Total cell count.
    #[must_use]
    pub fn volume(&self) -> usize {
        self.width as usize * self.width as usize * self.height as usize
    }

    /// Whether a local coordinate names a cell of this shape.
    #[must_use]
    pub fn contains(&self, coord: IVec3) -> bool {
        let w = i64::from(self.width);
        let h = i64::from(self.height);
        (0..w).contains(&i64::from(coord.x))
            && (0..w).contains(&i64::from(coord.y))
            && (0..h).contains(&i64::from(coord.z))
    }
}

/// Dense 3D array of `Block` indexed by local `(ix, iy, iz)`.
///
/// Storage is contiguous, `x + y * W + z * W * W`; callers must not depend on
/// the layout. Out-of-range lookups return `None`; out-of-range writes are an
/// `OutOfBounds` error.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockGrid {
    dims: ChunkDims,
    cells: Vec<Block>,
}

impl BlockGrid {
    /// Create a grid of the given shape, all cells `Air`.
    #[must_use]
    pub fn new(dims: ChunkDims) -> Self {
        BlockGrid {
            dims,
            cells: vec![Block::default(); dims.volume()],
        }
    }

    #[must_use]
    pub fn dims(&self) -> ChunkDims {
        self.dims
    }

    fn index(&self, coord: IVec3) -> Option<usize> {
        if !self.dims.contains(coord) {
            return None;
        }
        let w = self.dims.width as usize;
        let (x, y, z) = (coord.x as usize, coord.y as usize, coord.z as usize);
        Some(x + y * w + z * w * w)
    }

    /// Read the block at a local coordinate, `None` when out of range.
    #[must_use]
    pub fn get(&self, coord: IVec3) -> Option<Block> {
        self.index(coord).map(|i| self.cells[i])
    }

    /// Write the block at a local coordinate.
    ///
    /// # Errors
    /// `OutOfBounds` when the coordinate is outside the grid.
    pub fn set(&mut self, coord: IVec3, block: Block) -> Result<(), EngineError> {
        match self.index(coord) {
            Some(i) => {
                self.cells[i] = block;
                Ok(())
            }
            None => Err(EngineError::OutOfBounds(coord)),
        }
    }

    /// Reset every cell to `Air` without releasing the storage. Used when a
    /// chunk is returned to the pool.
    pub fn clear(&mut self) {
        self.cells.fill(Block::default());
    }
}
