//! Pattern compiler and conversion benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use oscroute_core::{args, is_osc_address_pattern, Pattern, TypeSpec};

fn compile_benchmark(c: &mut Criterion) {
    c.bench_function("compile_pattern", |b| {
        b.iter(|| black_box(Pattern::compile("/mixer/{ch1,ch2,ch3}/[a-z]*/gain?").unwrap()))
    });

    c.bench_function("classify_literal", |b| {
        b.iter(|| black_box(is_osc_address_pattern("/mixer/ch1/eq/gain").unwrap()))
    });
}

fn match_benchmark(c: &mut Criterion) {
    let pattern = Pattern::compile("/mixer/{ch1,ch2,ch3}/[a-z]*/gain?").unwrap();
    let traverse = Pattern::compile("//gain").unwrap();

    c.bench_function("match_pattern", |b| {
        b.iter(|| black_box(pattern.matches("/mixer/ch2/eq/gain1")))
    });

    c.bench_function("match_traverse", |b| {
        b.iter(|| black_box(traverse.matches("/a/b/c/d/e/gain")))
    });
}

fn pack_benchmark(c: &mut Criterion) {
    let spec = TypeSpec::parse("ifsT").unwrap();
    let values = args![1, 0.5, "name", true];

    c.bench_function("pack_arguments", |b| {
        b.iter(|| black_box(spec.pack(&values).unwrap()))
    });
}

criterion_group!(benches, compile_benchmark, match_benchmark, pack_benchmark);
criterion_main!(benches);
