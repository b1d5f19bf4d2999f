//! Benchmarks for building and traversing metaprograms
//!
//! Workloads:
//! - B1: Building a fibonacci-shaped trace (heavy vertex sharing)
//! - B2: Forward trace, minimized vs full mode
//!
//! Run with: cargo bench --bench trace_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use metatrace::{
    EvaluationResult, EventKind, FileLocation, Metaprogram, MetaprogramBuilder, Mode,
};

/// Replay the instantiation trace of `fib<n>` with memoized second calls
fn fib_events(builder: &mut MetaprogramBuilder, n: u32, done: &mut [bool], ts: &mut f64) {
    let loc = FileLocation::new("fib.hpp", 2, 8);
    let poe = FileLocation::new("fib.hpp", 4, 20);
    let kind = if done[n as usize] {
        EventKind::Memoization
    } else {
        EventKind::TemplateInstantiation
    };
    *ts += 1.0;
    let _ = builder.handle_template_begin(kind, &format!("fib<{}>", n), &poe, &loc, *ts);
    if kind == EventKind::TemplateInstantiation && n >= 2 {
        fib_events(builder, n - 1, done, ts);
        fib_events(builder, n - 2, done, ts);
    }
    done[n as usize] = true;
    *ts += 1.0;
    let _ = builder.handle_template_end(*ts);
}

fn build_fib(mode: Mode, n: u32) -> Metaprogram {
    let mut builder = MetaprogramBuilder::new(mode, "<root>", FileLocation::default());
    let mut done = vec![false; n as usize + 1];
    let mut ts = 0.0;
    fib_events(&mut builder, n, &mut done, &mut ts);
    let _ = builder.handle_evaluation_end(EvaluationResult::Type(format!("int_<fib<{}>>", n)));
    builder.into_metaprogram()
}

/// B1: Builder throughput
fn benchmark_b1_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("B1_Build");
    for n in [10u32, 20, 40] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| black_box(build_fib(Mode::Minimized, n)))
        });
    }
    group.finish();
}

/// B2: Forward trace over the same graph in both modes
///
/// Full mode re-expands every memoized subtree, so its node count grows
/// exponentially with n.
fn benchmark_b2_forward_trace(c: &mut Criterion) {
    let mut group = c.benchmark_group("B2_Forward_Trace");
    let n = 16;

    for mode in [Mode::Minimized, Mode::Full] {
        let mp = build_fib(mode, n);
        let nodes = mp.forward_trace(None).count();
        group.throughput(Throughput::Elements(nodes as u64));
        group.bench_function(mode.to_string(), |b| {
            b.iter(|| black_box(mp.forward_trace(black_box(None)).count()))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_b1_build, benchmark_b2_forward_trace);
criterion_main!(benches);
