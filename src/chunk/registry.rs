//! Process-wide chunk registry.
//!
//! Maps chunk grid positions to chunk slots. A slot distinguishes "reserved
//! but not yet built" (tombstone) from "moved into a background mesh build"
//! from "resident" so the scheduler never double-enqueues an origin and edits
//! can be refused while a build is in flight. The registry is owned by the
//! foreground thread; workers never touch it.

use std::collections::HashMap;

use bevy::math::IVec3;

use super::{Chunk, ChunkPos, local_of_global_cell};

/// Lifecycle slot for one origin.
#[derive(Debug)]
pub enum ChunkSlot {
    /// Origin claimed; generation has not completed yet.
    Reserved,
    /// The chunk is owned by a background mesh build.
    Meshing,
    /// The chunk is resident and readable.
    Ready(Box<Chunk>),
}

/// Mapping `chunk position -> slot`. At most one chunk per origin; handles
/// are unique owners while registered.
pub struct ChunkRegistry {
    width: u32,
    slots: HashMap<ChunkPos, ChunkSlot>,
}

impl ChunkRegistry {
    #[must_use]
    pub fn new(width: u32) -> Self {
        ChunkRegistry {
            width,
            slots: HashMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether any slot (tombstone or resident) claims this origin.
    #[must_use]
    pub fn contains(&self, pos: ChunkPos) -> bool {
        self.slots.contains_key(&pos)
    }

    #[must_use]
    pub fn is_resident(&self, pos: ChunkPos) -> bool {
        matches!(self.slots.get(&pos), Some(ChunkSlot::Ready(_)))
    }

    #[must_use]
    pub fn is_reserved(&self, pos: ChunkPos) -> bool {
        matches!(self.slots.get(&pos), Some(ChunkSlot::Reserved))
    }

    #[must_use]
    pub fn is_meshing(&self, pos: ChunkPos) -> bool {
        matches!(self.slots.get(&pos), Some(ChunkSlot::Meshing))
    }

    /// Reserve a tombstone for an origin. Returns `false` when the origin is
    /// already claimed.
    pub fn register(&mut self, pos: ChunkPos) -> bool {
        if self.slots.contains_key(&pos) {
            return false;
        }
        self.slots.insert(pos, ChunkSlot::Reserved);
        true
    }

    /// Install a completed chunk at its origin (also used to return a chunk
    /// taken for meshing).
    pub fn publish(&mut self, pos: ChunkPos, chunk: Box<Chunk>) {
        self.slots.insert(pos, ChunkSlot::Ready(chunk));
    }

    #[must_use]
    pub fn lookup(&self, pos: ChunkPos) -> Option<&Chunk> {
        match self.slots.get(&pos) {
            Some(ChunkSlot::Ready(chunk)) => Some(chunk),
            _ => None,
        }
    }

    pub fn lookup_mut(&mut self, pos: ChunkPos) -> Option<&mut Chunk> {
        match self.slots.get_mut(&pos) {
            Some(ChunkSlot::Ready(chunk)) => Some(chunk),
            _ => None,
        }
    }

    /// Move a resident chunk out for a background mesh build, leaving a
    /// `Meshing` marker. Returns `None` when the chunk is not resident.
    pub fn take_for_meshing(&mut self, pos: ChunkPos) -> Option<Box<Chunk>> {
        match self.slots.get_mut(&pos) {
            Some(slot @ ChunkSlot::Ready(_)) => {
                let ChunkSlot::Ready(chunk) = std::mem::replace(slot, ChunkSlot::Meshing) else {
                    unreachable!()
                };
                Some(chunk)
            }
            _ => None,
        }
    }

    /// Remove an origin. Returns the chunk for pool release when it was
    /// resident; tombstones and in-flight markers just disappear (their
    /// completions are dropped when they land).
    pub fn evict(&mut self, pos: ChunkPos) -> Option<Box<Chunk>> {
        match self.slots.remove(&pos) {
            Some(ChunkSlot::Ready(chunk)) => Some(chunk),
            _ => None,
        }
    }

    /// All claimed origins (any slot state).
    pub fn positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.slots.keys().copied()
    }

    /// Whether the cell at a global coordinate is air. Unregistered origins,
    /// non-resident slots and out-of-range cells all read as air.
    #[must_use]
    pub fn neighbor_is_air(&self, global: IVec3) -> bool {
        let pos = ChunkPos::of_global_cell(global, self.width);
        match self.lookup(pos) {
            Some(chunk) => chunk
                .block_at(local_of_global_cell(global, self.width))
                .is_none_or(|b| b.is_air()),
            None => true,
        }
    }

    /// Route a cross-chunk edit repair: insert the cell into the owning
    /// chunk's potential set and mark that chunk dirty. A miss (neighbor not
    /// resident) is fine — an unbuilt chunk will derive its own potential
    /// set when it generates.
    pub fn add_potential_block(&mut self, global: IVec3) {
        let pos = ChunkPos::of_global_cell(global, self.width);
        let local = local_of_global_cell(global, self.width);
        if let Some(chunk) = self.lookup_mut(pos) {
            chunk.add_potential_block(local);
            chunk.mark_dirty();
        }
    }

    /// Origins of resident chunks whose mesh was invalidated by an edit.
    #[must_use]
    pub fn dirty_positions(&self) -> Vec<ChunkPos> {
        self.slots
            .iter()
            .filter_map(|(pos, slot)| match slot {
                ChunkSlot::Ready(chunk) if chunk.is_dirty() => Some(*pos),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkDims;

    fn resident_chunk(pos: ChunkPos) -> Box<Chunk> {
        let mut chunk = Box::new(Chunk::new(ChunkDims::new(4, 8), 100.0));
        chunk.set_pos(pos);
        chunk
    }

    #[test]
    fn reserve_then_publish_lifecycle() {
        let mut registry = ChunkRegistry::new(4);
        let pos = ChunkPos::new(2, -1);

        assert!(registry.register(pos));
        assert!(!registry.register(pos), "tombstone must block re-reserve");
        assert!(registry.contains(pos));
        assert!(!registry.is_resident(pos));
        assert!(registry.lookup(pos).is_none());

        registry.publish(pos, resident_chunk(pos));
        assert!(registry.is_resident(pos));
        assert_eq!(registry.lookup(pos).unwrap().pos(), pos);
    }

    #[test]
    fn take_for_meshing_leaves_a_marker() {
        let mut registry = ChunkRegistry::new(4);
        let pos = ChunkPos::new(0, 0);
        registry.publish(pos, resident_chunk(pos));

        let chunk = registry.take_for_meshing(pos).unwrap();
        assert!(registry.is_meshing(pos));
        assert!(registry.contains(pos), "origin stays claimed while meshing");
        assert!(registry.take_for_meshing(pos).is_none());

        registry.publish(pos, chunk);
        assert!(registry.is_resident(pos));
    }

    #[test]
    fn evict_returns_only_resident_chunks() {
        let mut registry = ChunkRegistry::new(4);
        let reserved = ChunkPos::new(1, 0);
        let ready = ChunkPos::new(0, 1);
        registry.register(reserved);
        registry.publish(ready, resident_chunk(ready));

        assert!(registry.evict(reserved).is_none());
        assert!(registry.evict(ready).is_some());
        assert!(!registry.contains(reserved));
        assert!(!registry.contains(ready));
    }

    #[test]
    fn missing_chunks_read_as_air() {
        let mut registry = ChunkRegistry::new(4);
        assert!(registry.neighbor_is_air(IVec3::new(0, 0, 0)));

        let pos = ChunkPos::new(0, 0);
        registry.register(pos);
        // reserved tombstone is still "missing" for neighbor queries
        assert!(registry.neighbor_is_air(IVec3::new(1, 1, 0)));

        let mut chunk = resident_chunk(pos);
        chunk
            .modify_block(IVec3::new(1, 1, 0), crate::block::BlockType::Stone)
            .unwrap();
        registry.publish(pos, chunk);
        assert!(!registry.neighbor_is_air(IVec3::new(1, 1, 0)));
        assert!(registry.neighbor_is_air(IVec3::new(1, 1, 1)));
        // vertically out of range reads as air
        assert!(registry.neighbor_is_air(IVec3::new(1, 1, 99)));
    }

    #[test]
    fn cross_chunk_repair_marks_the_neighbor_dirty() {
        let mut registry = ChunkRegistry::new(4);
        let pos = ChunkPos::new(-1, 0);
        registry.publish(pos, resident_chunk(pos));

        // global cell (-1, 2, 3) lives in chunk (-1, 0) at local (3, 2, 3)
        registry.add_potential_block(IVec3::new(-1, 2, 3));
        let chunk = registry.lookup(pos).unwrap();
        assert!(chunk.is_dirty());
        assert_eq!(chunk.potential_len(), 1);
        assert_eq!(registry.dirty_positions(), vec![pos]);
    }
}
