use criterion::{Criterion, black_box, criterion_group, criterion_main};

use cobble::chunk::mesh::MeshMode;
use cobble::chunk::{Chunk, ChunkDims, ChunkPos, ChunkRegistry};
use cobble::terrain::HeightField;

fn field() -> HeightField {
    HeightField::from_seed(1337, 100.0, (6, 32))
}

/// Raw column-height sampling across a chunk-sized area.
fn bench_column_height(c: &mut Criterion) {
    let field = field();
    c.bench_function("column_height", |b| {
        b.iter(|| {
            let mut acc = 0i64;
            for y in 0..32 {
                for x in 0..32 {
                    let h = field
                        .column_height(x as f32 * 100.0, y as f32 * 100.0)
                        .unwrap();
                    acc += i64::from(h);
                }
            }
            black_box(acc);
        })
    });
}

/// Full chunk generation (grid fill + potential-set seeding).
fn bench_chunk_generate(c: &mut Criterion) {
    let field = field();
    c.bench_function("chunk_generate", |b| {
        b.iter(|| {
            for i in 0..4 {
                let mut chunk = Chunk::new(ChunkDims::new(32, 32), 100.0);
                chunk.set_pos(ChunkPos::new(i % 2, i / 2));
                chunk.generate(&field, 1337).unwrap();
                black_box(&chunk);
            }
        })
    });
}

/// First-time mesh build answering boundary neighbors from the height field.
fn bench_fast_mesh(c: &mut Criterion) {
    let field = field();
    let mut chunk = Chunk::new(ChunkDims::new(32, 32), 100.0);
    chunk.generate(&field, 1337).unwrap();

    c.bench_function("mesh_fast_build", |b| {
        b.iter(|| {
            let mut fresh = chunk.clone();
            let payload = fresh.build_mesh(MeshMode::FastBuild(&field)).unwrap();
            black_box(payload.triangle_count());
        })
    });
}

/// Rebuild answering boundary neighbors through the registry.
fn bench_authoritative_mesh(c: &mut Criterion) {
    let field = field();
    let registry = ChunkRegistry::new(32);
    let mut chunk = Chunk::new(ChunkDims::new(32, 32), 100.0);
    chunk.generate(&field, 1337).unwrap();

    c.bench_function("mesh_authoritative", |b| {
        b.iter(|| {
            let mut fresh = chunk.clone();
            let payload = fresh
                .build_mesh(MeshMode::Authoritative(&registry))
                .unwrap();
            black_box(payload.triangle_count());
        })
    });
}

criterion_group!(
    benches,
    bench_column_height,
    bench_chunk_generate,
    bench_fast_mesh,
    bench_authoritative_mesh
);
criterion_main!(benches);
