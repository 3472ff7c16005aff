use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use strata_tensor::{DataType, Tensor};

fn bench_extend(c: &mut Criterion) {
    let mut group = c.benchmark_group("Extend");

    for growth_pct in [0.0, 0.5, 1.0] {
        group.bench_with_input(
            BenchmarkId::new("extend_1000x1", growth_pct),
            &growth_pct,
            |b, &growth_pct| {
                b.iter(|| {
                    let mut t = Tensor::new(DataType::F32).unwrap();
                    for _ in 0..1000 {
                        t.extend_(black_box(1), growth_pct).unwrap();
                    }
                    t
                })
            },
        );
    }

    group.bench_function("reserve_then_extend_1000x1", |b| {
        b.iter(|| {
            let mut t = Tensor::new(DataType::F32).unwrap();
            t.reserve_([1000].as_slice().into()).unwrap();
            for _ in 0..1000 {
                t.extend_(black_box(1), 0.0).unwrap();
            }
            t
        })
    });

    group.finish();
}

criterion_group!(benches, bench_extend);
criterion_main!(benches);
