//! Criterion benchmarks for the FEEL engine: parse and evaluate phases
//! benchmarked separately, plus the parse-cache hit path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use feel_lang::Engine;
use serde_json::json;
use std::time::Duration;

fn custom_criterion() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .warm_up_time(Duration::from_millis(100))
        .measurement_time(Duration::from_secs(1))
        .nresamples(1000)
        .noise_threshold(0.05)
}

fn bench_arithmetic(c: &mut Criterion) {
    let engine = Engine::new();
    let ctx = json!({"base": 21});

    c.bench_function("evaluate_arithmetic", |b| {
        b.iter(|| engine.evaluate_expression(black_box("(base + 1) * 2 - 3"), black_box(&ctx)).unwrap())
    });
}

fn bench_iteration(c: &mut Criterion) {
    let engine = Engine::new();
    let ctx = json!({});

    c.bench_function("evaluate_for_expression", |b| {
        b.iter(|| {
            engine
                .evaluate_expression(black_box("for x in 1..50 return x * x"), black_box(&ctx))
                .unwrap()
        })
    });
}

fn bench_parse_cache(c: &mut Criterion) {
    let engine = Engine::new();
    let ctx = json!({"age": 21});
    // Warm the cache before timing repeated hits.
    engine.evaluate_expression("age >= 18", &ctx).unwrap();

    c.bench_function("evaluate_expression_cached_parse", |b| {
        b.iter(|| engine.evaluate_expression(black_box("age >= 18"), black_box(&ctx)).unwrap())
    });
}

criterion_group! {
    name = benches;
    config = custom_criterion();
    targets = bench_arithmetic, bench_iteration, bench_parse_cache
}
criterion_main!(benches);
