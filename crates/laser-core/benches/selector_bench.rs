//! Criterion benchmarks for the per-frame decision path.
//!
//! The selector's worst case (every candidate rejected) must stay well inside
//! one frame period; this bench measures it against the common case.
//!
//! Run with:
//! ```bash
//! cargo bench --package laser-core --bench selector_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use laser_core::{
    ActuatorPosition, AvoidZone, BoundingBox, CalibrationOffset, Detection, FrameSize,
    MotionMask, RandomSampler, TargetSelector, ZoneFilter,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// `n` non-overlapping 100×100 zones laid out left to right along the top.
fn zones(n: usize) -> Vec<AvoidZone> {
    (0..n)
        .map(|i| {
            let x = (i as i32 % 12) * 105;
            let y = (i as i32 / 12) * 105;
            AvoidZone::new(x, y, x + 100, y + 100).expect("ordered corners")
        })
        .collect()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("target_selector");

    for n in [0usize, 4, 32] {
        let zs = zones(n);
        let mut selector = TargetSelector::new(RandomSampler::seeded(1));
        group.bench_with_input(BenchmarkId::new("zones", n), &zs, |b, zs| {
            b.iter(|| {
                selector.select(
                    black_box(zs),
                    CalibrationOffset::default(),
                    ActuatorPosition::center(),
                )
            })
        });
    }

    let full = [AvoidZone::full_frame(FrameSize::default())];
    let mut selector = TargetSelector::new(RandomSampler::seeded(1));
    group.bench_function("full_frame_fallback", |b| {
        b.iter(|| {
            selector.select(
                black_box(&full),
                CalibrationOffset::default(),
                ActuatorPosition::center(),
            )
        })
    });

    group.finish();
}

fn bench_zone_filter(c: &mut Criterion) {
    let mut mask = MotionMask::new(1280, 720);
    mask.fill(BoundingBox::new(200, 200, 600, 500));
    let dets: Vec<Detection> = (0..10)
        .map(|i| {
            let x = i * 100;
            Detection::new(BoundingBox::new(x, 150, x + 300, 600), "person", 0.9)
        })
        .collect();
    let filter = ZoneFilter::default();

    c.bench_function("zone_filter_10_detections_720p", |b| {
        b.iter(|| filter.filter(black_box(&dets), black_box(&mask)))
    });
}

criterion_group!(benches, bench_select, bench_zone_filter);
criterion_main!(benches);
