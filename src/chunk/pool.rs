//! Fixed-capacity chunk freelist.
//!
//! All chunk buffers are constructed once, up front. Streaming acquires a
//! cleared chunk, fills it, and eventually releases it back; release resets
//! the chunk's state but keeps the grid's storage, so steady-state streaming
//! allocates nothing.

use crate::error::EngineError;

use super::grid::ChunkDims;
use super::Chunk;

/// Freelist of pre-constructed, reusable chunks.
pub struct ChunkPool {
    free: Vec<Box<Chunk>>,
    capacity: usize,
}

impl ChunkPool {
    /// Pre-construct `capacity` chunks of the given shape.
    #[must_use]
    pub fn new(capacity: usize, dims: ChunkDims, block_size: f32) -> Self {
        let free = (0..capacity)
            .map(|_| Box::new(Chunk::new(dims, block_size)))
            .collect();
        ChunkPool { free, capacity }
    }

    /// Capacity rule for streaming: `(2 * draw_distance)^2` chunks.
    #[must_use]
    pub fn for_draw_distance(draw_distance: u32, dims: ChunkDims, block_size: f32) -> Self {
        let side = 2 * draw_distance as usize;
        Self::new((side * side).max(1), dims, block_size)
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Take a cleared chunk from the pool.
    ///
    /// # Errors
    /// `PoolExhausted` when no chunk is free; the scheduler skips the rest of
    /// its generation drain for the tick.
    pub fn acquire(&mut self) -> Result<Box<Chunk>, EngineError> {
        self.free.pop().ok_or(EngineError::PoolExhausted)
    }

    /// Return a chunk. Its grid, potential set and mesh state are reset; the
    /// underlying storage is kept. Chunks beyond capacity (a completion that
    /// raced an eviction after a resize) are dropped.
    pub fn release(&mut self, mut chunk: Box<Chunk>) {
        if self.free.len() < self.capacity {
            chunk.clear();
            self.free.push(chunk);
        }
    }

    /// Re-size the pool after a draw-distance change. Growth constructs the
    /// missing chunks up front; shrinking drops surplus free chunks now and
    /// in-use surplus as it is released.
    pub fn set_capacity(&mut self, capacity: usize, dims: ChunkDims, block_size: f32) {
        if capacity > self.capacity {
            let missing = capacity - self.capacity;
            self.free
                .extend((0..missing).map(|_| Box::new(Chunk::new(dims, block_size))));
        } else {
            self.free.truncate(capacity);
        }
        self.capacity = capacity;
    }
}
