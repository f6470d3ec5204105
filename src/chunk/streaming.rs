//! Chunk streaming: the per-tick scheduler.
//!
//! `ChunkManager` keeps the terrain around the viewer resident. Each tick it
//! adapts its per-tick work caps to the backlog, sweeps the desired set of
//! origins ring by ring (nearest first), diffs that against the registry
//! (evict / reserve + enqueue), dispatches queued generation and meshing to
//! the async compute pool, and drains finished tasks — publishing chunks and
//! handing mesh payloads to the `MeshSink` on the foreground thread.
//!
//! All shared state (registry, pool, queues) is owned by the foreground
//! thread. Background tasks receive a chunk by value plus a height-field
//! clone and post results back through task completion; they never enqueue
//! anything themselves. For one chunk the phases are strictly sequential:
//! reserve, generate, mesh, apply.

use std::collections::{HashSet, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};

use bevy::log::{info, warn};
use bevy::math::Vec3;
use bevy::prelude::Resource;
use bevy::tasks::{AsyncComputeTaskPool, Task, TaskPool};

use crate::block::BlockType;
use crate::error::EngineError;
use crate::terrain::HeightField;

use super::mesh::{MeshMode, MeshPayload};
use super::pool::ChunkPool;
use super::registry::ChunkRegistry;
use super::stats::MeshStats;
use super::{Chunk, ChunkDims, ChunkPos, MeshState, global_cell_of_world, local_of_global_cell};

/// Source of the current observation point, in world units (Z up).
pub trait Viewer {
    fn current_position(&self) -> Vec3;
}

/// Destination for finalized mesh payloads. Called on the foreground thread
/// only.
pub trait MeshSink {
    /// Install or replace the mesh for a chunk.
    ///
    /// # Errors
    /// `MeshApplyFailed` when the host rejects the payload; the scheduler
    /// logs it and re-enqueues the chunk for meshing.
    fn apply(&mut self, pos: ChunkPos, payload: &MeshPayload) -> Result<(), EngineError>;

    /// Drop whatever was installed for an evicted chunk. Default: nothing.
    fn remove(&mut self, pos: ChunkPos) {
        let _ = pos;
    }
}

/// Streaming configuration. Mirrors the settings file one-to-one.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamingConfig {
    /// Radius of the desired set, in chunks.
    pub draw_distance: u32,
    /// World units per cell edge.
    pub block_size: f32,
    /// Chunk width in cells (square in plan).
    pub chunk_width: u32,
    /// Chunk height in cells.
    pub chunk_height: u32,
    /// Initial generation dispatches per tick, before backlog adaptation.
    pub max_chunks_per_tick: u32,
    /// Initial mesh dispatches per tick, before backlog adaptation.
    pub max_meshes_per_tick: u32,
    /// Inclusive column-height clamp.
    pub height_range: (i32, i32),
    /// World units per noise unit.
    pub noise_scale: f32,
    /// World seed for the noise and the solid-type RNG.
    pub seed: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        StreamingConfig {
            draw_distance: 4,
            block_size: 100.0,
            chunk_width: 32,
            chunk_height: 32,
            max_chunks_per_tick: 8,
            max_meshes_per_tick: 8,
            height_range: (6, 32),
            noise_scale: 100.0,
            seed: 1337,
        }
    }
}

struct GenTask {
    pos: ChunkPos,
    task: Task<(Box<Chunk>, Result<(), EngineError>)>,
}

struct MeshTask {
    pos: ChunkPos,
    task: Task<(Box<Chunk>, Result<MeshPayload, EngineError>)>,
}

const DIAG_INTERVAL_TICKS: u64 = 120;

/// The streaming scheduler. One instance per world, ticked once per frame
/// from the foreground thread.
#[derive(Resource)]
pub struct ChunkManager {
    config: StreamingConfig,
    height_field: HeightField,
    registry: ChunkRegistry,
    pool: ChunkPool,
    gen_queue: VecDeque<ChunkPos>,
    mesh_queue: VecDeque<ChunkPos>,
    pending_gen: Vec<GenTask>,
    pending_mesh: Vec<MeshTask>,
    max_gen_per_tick: usize,
    max_mesh_per_tick: usize,
    stats: MeshStats,
    ticks: u64,
}

impl ChunkManager {
    #[must_use]
    pub fn new(config: StreamingConfig) -> Self {
        let dims = ChunkDims::new(config.chunk_width, config.chunk_height);
        let height_field =
            HeightField::from_seed(config.seed, config.noise_scale, config.height_range);
        ChunkManager {
            registry: ChunkRegistry::new(config.chunk_width),
            pool: ChunkPool::for_draw_distance(config.draw_distance, dims, config.block_size),
            height_field,
            max_gen_per_tick: config.max_chunks_per_tick as usize,
            max_mesh_per_tick: config.max_meshes_per_tick as usize,
            config,
            gen_queue: VecDeque::new(),
            mesh_queue: VecDeque::new(),
            pending_gen: Vec::new(),
            pending_mesh: Vec::new(),
            stats: MeshStats::default(),
            ticks: 0,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ChunkRegistry {
        &self.registry
    }

    #[must_use]
    pub fn stats(&self) -> &MeshStats {
        &self.stats
    }

    #[must_use]
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Generation backlog (origins reserved but not yet dispatched).
    #[must_use]
    pub fn gen_backlog(&self) -> usize {
        self.gen_queue.len()
    }

    /// Meshing backlog (chunks generated but not yet dispatched to a build).
    #[must_use]
    pub fn mesh_backlog(&self) -> usize {
        self.mesh_queue.len()
    }

    /// Whether any background work is queued or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.gen_queue.is_empty()
            && self.mesh_queue.is_empty()
            && self.pending_gen.is_empty()
            && self.pending_mesh.is_empty()
    }

    /// Apply a changed configuration at runtime. Draw distance and the
    /// initial tick caps take effect immediately; grid shape, block size and
    /// seed are fixed for the lifetime of the manager.
    pub fn update_config(&mut self, config: &StreamingConfig) {
        if config.draw_distance != self.config.draw_distance {
            self.config.draw_distance = config.draw_distance;
            let dims = ChunkDims::new(self.config.chunk_width, self.config.chunk_height);
            let side = 2 * config.draw_distance as usize;
            self.pool
                .set_capacity((side * side).max(1), dims, self.config.block_size);
        }
        self.config.max_chunks_per_tick = config.max_chunks_per_tick;
        self.config.max_meshes_per_tick = config.max_meshes_per_tick;
    }

    /// Run one scheduler tick. Must be called from the foreground thread.
    pub fn tick(&mut self, viewer: &dyn Viewer, sink: &mut dyn MeshSink) {
        self.ticks += 1;
        self.adapt_throughput();

        let center = ChunkPos::of_world(
            viewer.current_position(),
            self.config.chunk_width,
            self.config.block_size,
        );
        self.refresh_desired_set(center, sink);

        self.collect_finished_generation();
        self.dispatch_generation();
        self.collect_finished_meshes(sink);
        self.dispatch_meshing();
        self.rebuild_dirty_chunks(sink);

        if self.ticks % DIAG_INTERVAL_TICKS == 0 {
            info!(
                "streaming: gen_queue={} mesh_queue={} in_flight={}/{} resident={} tris={}",
                self.gen_queue.len(),
                self.mesh_queue.len(),
                self.pending_gen.len(),
                self.pending_mesh.len(),
                self.stats.tracked_chunks(),
                self.stats.total_triangles(),
            );
        }
    }

    /// Place a block at a world position. Foreground-thread call; rebuilds
    /// the owning chunk in authoritative mode and publishes immediately.
    ///
    /// # Errors
    /// `UnknownChunk` when no resident chunk owns the position (including a
    /// chunk currently off in a background build); `OutOfBounds` when the
    /// cell is outside the vertical range. Nothing changes on error.
    pub fn add_block(
        &mut self,
        world_pos: Vec3,
        kind: BlockType,
        sink: &mut dyn MeshSink,
    ) -> Result<(), EngineError> {
        self.edit_block(world_pos, kind, sink)
    }

    /// Remove the block at a world position (set it to air).
    ///
    /// # Errors
    /// As [`ChunkManager::add_block`].
    pub fn remove_block(
        &mut self,
        world_pos: Vec3,
        sink: &mut dyn MeshSink,
    ) -> Result<(), EngineError> {
        self.edit_block(world_pos, BlockType::Air, sink)
    }

    fn edit_block(
        &mut self,
        world_pos: Vec3,
        kind: BlockType,
        sink: &mut dyn MeshSink,
    ) -> Result<(), EngineError> {
        let global = global_cell_of_world(world_pos, self.config.block_size);
        let pos = ChunkPos::of_global_cell(global, self.config.chunk_width);
        let local = local_of_global_cell(global, self.config.chunk_width);

        let Some(chunk) = self.registry.lookup_mut(pos) else {
            return Err(EngineError::UnknownChunk(pos.x, pos.y));
        };
        let foreign = chunk.modify_block(local, kind)?;
        for cell in foreign {
            self.registry.add_potential_block(cell);
        }
        // The chunk may still be queued for its first-time build. That build
        // answers boundary neighbors from the height field, which no longer
        // matches the grid; the authoritative rebuild below supersedes it.
        self.mesh_queue.retain(|&p| p != pos);
        self.rebuild_authoritative(pos, sink)
    }

    /// Backlog-driven per-tick caps.
    fn adapt_throughput(&mut self) {
        self.max_gen_per_tick = match self.gen_queue.len() {
            n if n >= 600 => 32,
            n if n >= 300 => 16,
            n if n >= 100 => 8,
            _ => 4,
        };
        self.max_mesh_per_tick = match self.mesh_queue.len() {
            n if n >= 600 => 16,
            n if n >= 300 => 8,
            n if n >= 100 => 4,
            n if n >= 50 => 2,
            _ => 1,
        };
    }

    /// Ring-by-ring sweep of the origins that should be resident around a
    /// center chunk, nearest ring first. A cell belongs to the ring whose
    /// radius its distance rounds to; near 45 degrees at large radii a few
    /// cells fall between rings, which is accepted.
    fn desired_origins(&self, center: ChunkPos) -> Vec<ChunkPos> {
        let d = self.config.draw_distance as i32;
        let mut out = Vec::new();
        for r in 0..=d {
            for x in -r..=r {
                for y in -r..=r {
                    #[allow(clippy::cast_precision_loss)]
                    let (dist, ring) = (((x * x + y * y) as f32).sqrt(), r as f32);
                    if (dist - ring).abs() < 0.5 {
                        out.push(ChunkPos::new(center.x + x, center.y + y));
                    }
                }
            }
        }
        out
    }

    fn refresh_desired_set(&mut self, center: ChunkPos, sink: &mut dyn MeshSink) {
        let desired = self.desired_origins(center);
        let desired_set: HashSet<ChunkPos> = desired.iter().copied().collect();

        let stale: Vec<ChunkPos> = self
            .registry
            .positions()
            .filter(|pos| !desired_set.contains(pos))
            .collect();
        for pos in stale {
            if let Some(chunk) = self.registry.evict(pos) {
                self.pool.release(chunk);
            }
            self.stats.remove_chunk(pos);
            sink.remove(pos);
        }

        for pos in desired {
            if self.registry.register(pos) {
                self.gen_queue.push_back(pos);
            }
        }
    }

    fn dispatch_generation(&mut self) {
        let task_pool = AsyncComputeTaskPool::get_or_init(TaskPool::default);
        let mut dispatched = 0usize;
        while dispatched < self.max_gen_per_tick {
            let Some(pos) = self.gen_queue.pop_front() else {
                break;
            };
            // Evicted while queued; its tombstone is gone.
            if !self.registry.is_reserved(pos) {
                continue;
            }
            let mut chunk = match self.pool.acquire() {
                Ok(chunk) => chunk,
                Err(EngineError::PoolExhausted) => {
                    self.gen_queue.push_front(pos);
                    break;
                }
                Err(err) => {
                    warn!("chunk acquire failed for ({}, {}): {err}", pos.x, pos.y);
                    self.gen_queue.push_front(pos);
                    break;
                }
            };
            chunk.set_pos(pos);

            let field = self.height_field.clone();
            let seed = self.config.seed;
            let task = task_pool.spawn(async move {
                let result = chunk.generate(&field, seed);
                (chunk, result)
            });
            self.pending_gen.push(GenTask { pos, task });
            dispatched += 1;
        }
    }

    fn collect_finished_generation(&mut self) {
        let mut completed = Vec::new();
        self.pending_gen.retain_mut(|gen_task| {
            if gen_task.task.is_finished() {
                if let Ok(outcome) = catch_unwind(AssertUnwindSafe(|| {
                    futures::executor::block_on(&mut gen_task.task)
                })) {
                    completed.push((gen_task.pos, outcome));
                } else {
                    warn!(
                        "generation task for ({}, {}) panicked",
                        gen_task.pos.x, gen_task.pos.y
                    );
                }
                false
            } else {
                true
            }
        });

        for (pos, (chunk, result)) in completed {
            if !self.registry.is_reserved(pos) {
                // Evicted while generating; drop the result.
                self.pool.release(chunk);
                continue;
            }
            match result {
                Ok(()) => {
                    self.registry.publish(pos, chunk);
                    self.mesh_queue.push_back(pos);
                }
                Err(err) => {
                    warn!("generation failed for ({}, {}): {err}", pos.x, pos.y);
                    self.registry.evict(pos);
                    self.pool.release(chunk);
                }
            }
        }
    }

    fn dispatch_meshing(&mut self) {
        let task_pool = AsyncComputeTaskPool::get_or_init(TaskPool::default);
        let mut dispatched = 0usize;
        while dispatched < self.max_mesh_per_tick {
            let Some(pos) = self.mesh_queue.pop_front() else {
                break;
            };
            let Some(mut chunk) = self.registry.take_for_meshing(pos) else {
                continue;
            };
            chunk.set_mesh_state(MeshState::Building);

            let field = self.height_field.clone();
            let task = task_pool.spawn(async move {
                let result = chunk.build_mesh(MeshMode::FastBuild(&field));
                (chunk, result)
            });
            self.pending_mesh.push(MeshTask { pos, task });
            dispatched += 1;
        }
    }

    fn collect_finished_meshes(&mut self, sink: &mut dyn MeshSink) {
        let mut completed = Vec::new();
        self.pending_mesh.retain_mut(|build| {
            if build.task.is_finished() {
                if let Ok(outcome) = catch_unwind(AssertUnwindSafe(|| {
                    futures::executor::block_on(&mut build.task)
                })) {
                    completed.push((build.pos, outcome));
                } else {
                    warn!("mesh task for ({}, {}) panicked", build.pos.x, build.pos.y);
                }
                false
            } else {
                true
            }
        });

        for (pos, (chunk, result)) in completed {
            if !self.registry.is_meshing(pos) {
                // Evicted while building; drop the result.
                self.pool.release(chunk);
                continue;
            }
            match result {
                Ok(payload) => {
                    self.registry.publish(pos, chunk);
                    self.apply_payload(pos, &payload, sink);
                }
                Err(err) => {
                    warn!("mesh build failed for ({}, {}): {err}", pos.x, pos.y);
                    self.registry.evict(pos);
                    self.pool.release(chunk);
                    self.stats.remove_chunk(pos);
                    sink.remove(pos);
                }
            }
        }
    }

    fn apply_payload(&mut self, pos: ChunkPos, payload: &MeshPayload, sink: &mut dyn MeshSink) {
        match sink.apply(pos, payload) {
            Ok(()) => {
                self.stats.update_chunk(pos, payload.triangle_count());
            }
            Err(err) => {
                warn!("mesh apply rejected for ({}, {}): {err}", pos.x, pos.y);
                self.mesh_queue.push_back(pos);
            }
        }
    }

    /// Rebuild chunks whose meshes were invalidated by cross-chunk edits.
    /// Runs in authoritative mode on the foreground thread.
    fn rebuild_dirty_chunks(&mut self, sink: &mut dyn MeshSink) {
        for pos in self.registry.dirty_positions() {
            if let Err(err) = self.rebuild_authoritative(pos, sink) {
                warn!("dirty rebuild failed for ({}, {}): {err}", pos.x, pos.y);
            }
        }
    }

    fn rebuild_authoritative(
        &mut self,
        pos: ChunkPos,
        sink: &mut dyn MeshSink,
    ) -> Result<(), EngineError> {
        let Some(mut chunk) = self.registry.take_for_meshing(pos) else {
            return Err(EngineError::UnknownChunk(pos.x, pos.y));
        };
        let result = chunk.build_mesh(MeshMode::Authoritative(&self.registry));
        match result {
            Ok(payload) => {
                self.registry.publish(pos, chunk);
                self.apply_payload(pos, &payload, sink);
                Ok(())
            }
            Err(err) => {
                self.registry.evict(pos);
                self.pool.release(chunk);
                self.stats.remove_chunk(pos);
                sink.remove(pos);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::NoiseSource;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedViewer(Vec3);

    impl Viewer for FixedViewer {
        fn current_position(&self) -> Vec3 {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        applied: HashMap<ChunkPos, usize>,
        apply_count: usize,
        removed: Vec<ChunkPos>,
        rejections_left: usize,
    }

    impl MeshSink for RecordingSink {
        fn apply(&mut self, pos: ChunkPos, payload: &MeshPayload) -> Result<(), EngineError> {
            if self.rejections_left > 0 {
                self.rejections_left -= 1;
                return Err(EngineError::MeshApplyFailed("sink busy".into()));
            }
            self.applied.insert(pos, payload.face_count());
            self.apply_count += 1;
            Ok(())
        }

        fn remove(&mut self, pos: ChunkPos) {
            self.removed.push(pos);
        }
    }

    fn small_config(draw_distance: u32) -> StreamingConfig {
        StreamingConfig {
            draw_distance,
            block_size: 100.0,
            chunk_width: 4,
            chunk_height: 8,
            height_range: (2, 6),
            seed: 71,
            ..StreamingConfig::default()
        }
    }

    /// Tick until the manager goes idle (bounded).
    fn run_until_idle(manager: &mut ChunkManager, viewer: &FixedViewer, sink: &mut RecordingSink) {
        for _ in 0..600 {
            manager.tick(viewer, sink);
            if manager.is_idle() {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("streaming did not settle");
    }

    #[test]
    fn generation_caps_follow_the_backlog() {
        let mut manager = ChunkManager::new(small_config(1));
        for (backlog, cap) in [(0, 4), (99, 4), (100, 8), (299, 8), (300, 16), (600, 32)] {
            manager.gen_queue = (0..backlog).map(|i| ChunkPos::new(i, 0)).collect();
            manager.adapt_throughput();
            assert_eq!(manager.max_gen_per_tick, cap, "backlog {backlog}");
        }
    }

    #[test]
    fn mesh_caps_follow_the_backlog() {
        let mut manager = ChunkManager::new(small_config(1));
        for (backlog, cap) in [(0, 1), (49, 1), (50, 2), (100, 4), (300, 8), (600, 16)] {
            manager.mesh_queue = (0..backlog).map(|i| ChunkPos::new(i, 0)).collect();
            manager.adapt_throughput();
            assert_eq!(manager.max_mesh_per_tick, cap, "backlog {backlog}");
        }
    }

    #[test]
    fn desired_set_grows_ring_by_ring() {
        let manager = ChunkManager::new(small_config(2));
        let origins = manager.desired_origins(ChunkPos::new(0, 0));

        // r=0 yields 1, r=1 yields 8, r=2 yields 12.
        assert_eq!(origins.len(), 21);
        assert_eq!(origins[0], ChunkPos::new(0, 0));

        let mut last_ring = 0.0f32;
        for pos in &origins {
            #[allow(clippy::cast_precision_loss)]
            let dist = ((pos.x * pos.x + pos.y * pos.y) as f32).sqrt();
            let ring = dist.round();
            assert!(ring >= last_ring, "ring order broken at {pos:?}");
            last_ring = ring;
        }

        let unique: HashSet<ChunkPos> = origins.iter().copied().collect();
        assert_eq!(unique.len(), origins.len());
    }

    #[test]
    fn backpressure_dispatches_at_most_the_cap() {
        let mut manager = ChunkManager::new(small_config(1));
        let dims = ChunkDims::new(4, 8);
        manager.pool.set_capacity(800, dims, 100.0);
        for i in 0..700 {
            let pos = ChunkPos::new(i, 1000);
            manager.registry.register(pos);
            manager.gen_queue.push_back(pos);
        }

        manager.adapt_throughput();
        assert_eq!(manager.max_gen_per_tick, 32);
        manager.dispatch_generation();
        assert_eq!(manager.pending_gen.len(), 32);
        assert_eq!(manager.gen_queue.len(), 668);

        // With the backlog drained below 100 the cap falls back to 4.
        manager.gen_queue.truncate(99);
        manager.adapt_throughput();
        assert_eq!(manager.max_gen_per_tick, 4);
    }

    #[test]
    fn pool_exhaustion_skips_the_rest_of_the_drain() {
        let mut manager = ChunkManager::new(small_config(1));
        let dims = ChunkDims::new(4, 8);
        manager.pool.set_capacity(2, dims, 100.0);
        for i in 0..5 {
            let pos = ChunkPos::new(i, 0);
            manager.registry.register(pos);
            manager.gen_queue.push_back(pos);
        }

        manager.adapt_throughput();
        manager.dispatch_generation();
        assert_eq!(manager.pending_gen.len(), 2);
        // The next queued origin survives for a later tick.
        assert_eq!(manager.gen_queue.len(), 3);
        assert_eq!(manager.gen_queue.front(), Some(&ChunkPos::new(2, 0)));
    }

    #[test]
    fn streams_the_desired_set_around_the_viewer() {
        let mut manager = ChunkManager::new(small_config(1));
        // The circular frontier at D=1 (9 origins) outgrows the (2D)^2 pool;
        // size it up so the whole set becomes resident.
        manager
            .pool
            .set_capacity(16, ChunkDims::new(4, 8), 100.0);
        let viewer = FixedViewer(Vec3::new(50.0, 50.0, 600.0));
        let mut sink = RecordingSink::default();

        run_until_idle(&mut manager, &viewer, &mut sink);

        let desired = manager.desired_origins(ChunkPos::new(0, 0));
        assert_eq!(desired.len(), 9);
        for pos in &desired {
            assert!(manager.registry.is_resident(*pos), "missing chunk {pos:?}");
            assert!(sink.applied.contains_key(pos), "no mesh applied for {pos:?}");
            assert!(sink.applied[pos] > 0, "empty mesh for {pos:?}");
        }
        assert_eq!(manager.stats().tracked_chunks(), 9);
    }

    #[test]
    fn moving_the_viewer_evicts_and_loads_symmetrically() {
        let mut manager = ChunkManager::new(small_config(1));
        manager
            .pool
            .set_capacity(16, ChunkDims::new(4, 8), 100.0);
        let mut sink = RecordingSink::default();

        let home = FixedViewer(Vec3::new(50.0, 50.0, 600.0));
        run_until_idle(&mut manager, &home, &mut sink);

        let old_set: HashSet<ChunkPos> =
            manager.desired_origins(ChunkPos::new(0, 0)).into_iter().collect();
        let new_set: HashSet<ChunkPos> =
            manager.desired_origins(ChunkPos::new(2, 0)).into_iter().collect();
        let expected_evictions: HashSet<ChunkPos> =
            old_set.difference(&new_set).copied().collect();
        let expected_loads: HashSet<ChunkPos> = new_set.difference(&old_set).copied().collect();
        assert_eq!(expected_evictions.len(), expected_loads.len());

        sink.removed.clear();
        // Two chunk spans in +X.
        let moved = FixedViewer(Vec3::new(50.0 + 2.0 * 400.0, 50.0, 600.0));
        run_until_idle(&mut manager, &moved, &mut sink);

        let removed: HashSet<ChunkPos> = sink.removed.iter().copied().collect();
        assert_eq!(removed, expected_evictions);
        for pos in &expected_loads {
            assert!(manager.registry.is_resident(*pos));
            assert!(sink.applied.contains_key(pos));
        }
        for pos in &expected_evictions {
            assert!(!manager.registry.contains(*pos));
        }
    }

    #[test]
    fn edits_rebuild_immediately_and_dirty_the_neighbors() {
        let mut manager = ChunkManager::new(small_config(1));
        manager
            .pool
            .set_capacity(16, ChunkDims::new(4, 8), 100.0);
        let viewer = FixedViewer(Vec3::new(50.0, 50.0, 600.0));
        let mut sink = RecordingSink::default();
        run_until_idle(&mut manager, &viewer, &mut sink);

        // Cell (0, 1, 0) of chunk (0,0): the bottom layer is always solid
        // (heights are clamped to at least 2 here).
        let applies_before = sink.apply_count;
        let edit_point = Vec3::new(10.0, 110.0, 10.0);
        manager.remove_block(edit_point, &mut sink).unwrap();
        assert!(sink.apply_count > applies_before, "edit did not re-apply");
        let cell = manager
            .registry
            .lookup(ChunkPos::new(0, 0))
            .unwrap()
            .block_at(bevy::math::IVec3::new(0, 1, 0))
            .unwrap();
        assert!(cell.is_air());

        // The edit touched column x=0, so chunk (-1, 0) took a repair and
        // rebuilds on the next tick.
        assert!(manager
            .registry
            .dirty_positions()
            .contains(&ChunkPos::new(-1, 0)));
        manager.tick(&viewer, &mut sink);
        assert!(manager.registry.dirty_positions().is_empty());
    }

    #[test]
    fn an_edit_cancels_a_queued_first_time_build() {
        let mut manager = ChunkManager::new(small_config(1));
        manager
            .pool
            .set_capacity(16, ChunkDims::new(4, 8), 100.0);
        let viewer = FixedViewer(Vec3::new(50.0, 50.0, 600.0));
        let mut sink = RecordingSink::default();
        run_until_idle(&mut manager, &viewer, &mut sink);

        // Re-create the window between generation completing and the mesh
        // dispatch: the chunk is resident while its origin still sits in
        // the mesh queue.
        let pos = ChunkPos::new(0, 0);
        manager.mesh_queue.push_back(pos);

        manager
            .remove_block(Vec3::new(10.0, 110.0, 10.0), &mut sink)
            .unwrap();
        assert!(!manager.mesh_queue.contains(&pos));

        // Later ticks must not land a stale height-field build over the
        // authoritative mesh (the dirtied neighbors may re-apply, the
        // edited chunk must not).
        let edited_faces = sink.applied[&pos];
        for _ in 0..3 {
            manager.tick(&viewer, &mut sink);
            std::thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(sink.applied[&pos], edited_faces);
    }

    #[test]
    fn edits_on_missing_chunks_are_refused() {
        let mut manager = ChunkManager::new(small_config(1));
        let mut sink = RecordingSink::default();
        let far = Vec3::new(4000.0, 4000.0, 0.0);
        assert!(matches!(
            manager.remove_block(far, &mut sink),
            Err(EngineError::UnknownChunk(10, 10))
        ));
    }

    #[test]
    fn edits_are_refused_while_the_chunk_is_building() {
        let mut manager = ChunkManager::new(small_config(1));
        manager
            .pool
            .set_capacity(16, ChunkDims::new(4, 8), 100.0);
        let viewer = FixedViewer(Vec3::new(50.0, 50.0, 600.0));
        let mut sink = RecordingSink::default();
        run_until_idle(&mut manager, &viewer, &mut sink);

        let pos = ChunkPos::new(0, 0);
        let chunk = manager.registry.take_for_meshing(pos).unwrap();
        let err = manager.remove_block(Vec3::new(10.0, 10.0, 10.0), &mut sink);
        assert!(matches!(err, Err(EngineError::UnknownChunk(0, 0))));
        manager.registry.publish(pos, chunk);
    }

    #[test]
    fn rejected_payloads_are_re_enqueued() {
        let mut manager = ChunkManager::new(small_config(1));
        manager
            .pool
            .set_capacity(16, ChunkDims::new(4, 8), 100.0);
        let viewer = FixedViewer(Vec3::new(50.0, 50.0, 600.0));
        let mut sink = RecordingSink {
            rejections_left: 3,
            ..RecordingSink::default()
        };

        run_until_idle(&mut manager, &viewer, &mut sink);
        assert_eq!(sink.rejections_left, 0);
        for pos in manager.desired_origins(ChunkPos::new(0, 0)) {
            assert!(sink.applied.contains_key(&pos), "chunk {pos:?} never landed");
        }
    }

    struct BrokenNoise;

    impl NoiseSource for BrokenNoise {
        fn get(&self, _x: f32, _y: f32) -> f32 {
            f32::NAN
        }
    }

    #[test]
    fn noise_failures_evict_and_release() {
        let mut manager = ChunkManager::new(small_config(1));
        manager
            .pool
            .set_capacity(16, ChunkDims::new(4, 8), 100.0);
        manager.height_field = HeightField::new(Arc::new(BrokenNoise), 100.0, (2, 6));
        let viewer = FixedViewer(Vec3::new(50.0, 50.0, 600.0));
        let mut sink = RecordingSink::default();

        for _ in 0..40 {
            manager.tick(&viewer, &mut sink);
            std::thread::sleep(Duration::from_millis(2));
        }
        // Drain whatever is still in flight, then confirm every buffer came
        // home and nothing was published.
        for _ in 0..40 {
            if manager.pending_gen.is_empty() {
                break;
            }
            manager.tick(&viewer, &mut sink);
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(sink.applied.is_empty());
        assert_eq!(
            manager.pool.free_count() + manager.pending_gen.len(),
            manager.pool.capacity()
        );
        for pos in manager.desired_origins(ChunkPos::new(0, 0)) {
            assert!(!manager.registry.is_resident(pos));
        }
    }
}
