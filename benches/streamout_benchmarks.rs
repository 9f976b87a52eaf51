//! Microbenchmarks for the hot per-frame paths: layout partitioning and
//! configuration diffing.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use streamout_capture::{
    ElementFormat, OutputElement, OutputLayout, StreamOutConfig, StreamOutRenderer,
};

fn layout_of(n: usize) -> OutputLayout {
    (0..n)
        .map(|i| {
            OutputElement::new("TEXCOORD", ElementFormat::Float4, (i * 16) as u32)
                .with_semantic_index(i as u32)
        })
        .collect()
}

fn bench_partition(c: &mut Criterion) {
    let layout = layout_of(16);

    c.bench_function("partition_full_layout", |b| {
        b.iter(|| black_box(&layout).partition(4, &[-1, -1, -1, -1]).unwrap())
    });

    c.bench_function("partition_split_layout", |b| {
        b.iter(|| black_box(&layout).partition(4, &[4, 4, 4, -1]).unwrap())
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let mut renderer = StreamOutRenderer::with_config(
        StreamOutConfig::new()
            .with_buffer_count(4)
            .with_layout(layout_of(16)),
    );

    c.bench_function("evaluate_unchanged_config", |b| {
        b.iter(|| renderer.evaluate(black_box(1)))
    });
}

criterion_group!(benches, bench_partition, bench_evaluate);
criterion_main!(benches);
