use criterion::{black_box, criterion_group, criterion_main, Criterion};

use iolens::analysis::{aggregate, classify, imbalance, AnalysisOptions};
use iolens::normalize::NormalizedTrace;
use iolens::record::{FileCatalog, FileEntry, Interface, IoRecord, JobMeta, Module, ModuleSet, Operation};
use iolens::thresholds::ThresholdPolicy;

/// Synthetic trace: 64 files, 8 ranks, mixed read/write traffic with a
/// scattered-offset tail to exercise the random classification branch.
fn build_trace(records_per_file: u64) -> NormalizedTrace {
    let mut catalog = FileCatalog::new();
    let mut modules = ModuleSet::new();
    modules.insert(Module::Posix);

    let mut records = Vec::new();
    for file_id in 1..=64u64 {
        catalog.insert(file_id, FileEntry::new(format!("/bench/file-{file_id:03}")));

        for i in 0..records_per_file {
            let rank = (i % 8) as i32;
            let operation = if i % 3 == 0 {
                Operation::Write
            } else {
                Operation::Read
            };
            let offset = if i % 7 == 0 {
                (i * 7919) % 1_000_000
            } else {
                i * 4096
            };

            records.push(IoRecord {
                file_id,
                rank,
                operation,
                interface: Interface::Posix,
                offset: Some(offset),
                size: 4096,
                start: i as f64 * 0.001,
                end: i as f64 * 0.001 + 0.0005,
                collective: false,
                nonblocking: false,
            });
        }
    }

    NormalizedTrace {
        records,
        catalog,
        modules,
        job: JobMeta::default(),
        counters: None,
    }
}

fn bench_aggregate(c: &mut Criterion) {
    let trace = build_trace(256);
    let policy = ThresholdPolicy::default();

    c.bench_function("aggregate_16k_records", |b| {
        b.iter(|| aggregate::aggregate(black_box(&trace), black_box(&policy)))
    });
}

fn bench_classify(c: &mut Criterion) {
    let trace = build_trace(256);

    c.bench_function("classify_16k_records", |b| {
        b.iter(|| classify::classify(black_box(&trace)))
    });
}

fn bench_imbalance(c: &mut Criterion) {
    let trace = build_trace(256);
    let policy = ThresholdPolicy::default();

    c.bench_function("imbalance_16k_records", |b| {
        b.iter(|| imbalance::detect(black_box(&trace), black_box(&policy)))
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let trace = build_trace(64);

    c.bench_function("full_pipeline_4k_records", |b| {
        b.iter(|| {
            iolens::analysis::run(
                black_box(&trace),
                ThresholdPolicy::default(),
                AnalysisOptions::default(),
            )
        })
    });
}

criterion_group!(
    benches,
    bench_aggregate,
    bench_classify,
    bench_imbalance,
    bench_full_pipeline
);
criterion_main!(benches);
