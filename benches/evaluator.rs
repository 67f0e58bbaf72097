//! Evaluator cache benchmarks
//!
//! Measures cache hits against misses that compile and run the key, and
//! the cost of crossing the boundary for common value shapes.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jvbridge::{Bridge, Environment, HostValue, Operator};

fn bridge() -> Bridge {
    Bridge::with_environment(Environment::default())
}

fn generate_keys(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| format!("f_{i}(x) = x + {i}\nf_{i}({i})"))
        .collect()
}

fn bench_hits_versus_misses(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluator");

    let warm = bridge();
    warm.eval("sum(collect(1:100))").unwrap();
    group.bench_function("hit", |b| {
        b.iter(|| warm.eval(black_box("sum(collect(1:100))")).unwrap())
    });

    for size in [16, 128] {
        let keys = generate_keys(size);
        group.bench_with_input(BenchmarkId::new("miss", size), &keys, |b, keys| {
            b.iter(|| {
                let cold = bridge();
                for key in keys {
                    black_box(cold.eval(key).unwrap());
                }
            })
        });
    }

    group.finish();
}

fn bench_operator_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let bridge = bridge();
    let pi = bridge.eval("pi").unwrap();
    let two = HostValue::from(2);

    group.bench_function("handle_add", |b| {
        b.iter(|| bridge.operator(Operator::Add, black_box(&[pi.clone(), two.clone()])).unwrap())
    });
    group.bench_function("native_add", |b| {
        b.iter(|| bridge.operator(Operator::Add, black_box(&[two.clone(), two.clone()])).unwrap())
    });

    group.finish();
}

fn bench_array_views(c: &mut Criterion) {
    let mut group = c.benchmark_group("arrays");
    let bridge = bridge();

    for size in [100, 10_000] {
        let source = format!("ones(Float64, {size})");
        group.bench_with_input(BenchmarkId::new("to_host_view", size), &source, |b, source| {
            let value = bridge.engine().eval(source).unwrap();
            b.iter(|| black_box(bridge.to_host(&value)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_hits_versus_misses, bench_operator_dispatch, bench_array_views);
criterion_main!(benches);
