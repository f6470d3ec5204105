//! Engine error taxonomy.
//!
//! Every fallible path in the chunk pipeline reports through `EngineError`.
//! Workers never panic across the task boundary; they return an error through
//! their completion value and the scheduler reconciles (release, retry, drop).

use bevy::math::IVec3;
use thiserror::Error;

/// Errors produced by the chunk pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A cell coordinate fell outside a chunk's grid. Recovered as `None` in
    /// lookups; fatal when raised from an edit.
    #[error("block coordinate {0} is outside the chunk grid")]
    OutOfBounds(IVec3),

    /// The chunk pool has no free chunks. The scheduler skips the rest of the
    /// tick's generation drain and retries next tick.
    #[error("chunk pool exhausted")]
    PoolExhausted,

    /// A query or edit named an origin with no resident chunk.
    #[error("no chunk registered at ({0}, {1})")]
    UnknownChunk(i32, i32),

    /// The host rejected a mesh payload. The chunk is re-enqueued for meshing.
    #[error("mesh sink rejected payload: {0}")]
    MeshApplyFailed(String),

    /// The noise source produced a non-finite sample. Fatal for the affected
    /// chunk; it is evicted and released back to the pool.
    #[error("noise source returned a non-finite value: {0}")]
    NoiseFailure(f32),
}
