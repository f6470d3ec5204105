//! Streaming mesh statistics.
//!
//! Tracks per-chunk triangle counts and a running total so the scheduler's
//! diagnostics line can report what the resident terrain costs without
//! rescanning anything.

use std::collections::HashMap;

use super::ChunkPos;

/// Per-chunk triangle counts plus the aggregate across resident chunks.
#[derive(Debug, Default)]
pub struct MeshStats {
    per_chunk_triangles: HashMap<ChunkPos, usize>,
    total_triangles: usize,
}

impl MeshStats {
    /// Record the latest triangle count for a chunk and adjust the total.
    pub fn update_chunk(&mut self, pos: ChunkPos, triangles: usize) {
        let prev = self.per_chunk_triangles.insert(pos, triangles).unwrap_or(0);
        self.total_triangles = self.total_triangles + triangles - prev;
    }

    /// Drop a chunk's entry (eviction) and adjust the total.
    pub fn remove_chunk(&mut self, pos: ChunkPos) {
        if let Some(prev) = self.per_chunk_triangles.remove(&pos) {
            self.total_triangles = self.total_triangles.saturating_sub(prev);
        }
    }

    #[must_use]
    pub fn total_triangles(&self) -> usize {
        self.total_triangles
    }

    #[must_use]
    pub fn tracked_chunks(&self) -> usize {
        self.per_chunk_triangles.len()
    }
}
