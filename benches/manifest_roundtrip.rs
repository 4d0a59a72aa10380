//! Benchmarks for manifest handling
//!
//! This benchmark measures:
//! - Document parse and serialize
//! - Service map decoding across both entry layouts
//! - Replace on manifests of growing size
//! - Snapshot comparison

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pinsync::manifest::ManifestDocument;
use pinsync::types::{service_map, PlatformSnapshot, Release, ServiceMap};

/// Manifest with `n` services alternating flat and nested entries.
fn sample_manifest(n: usize) -> String {
    let mut out = String::from("# generated for benchmarks\nservices:\n");
    for i in 0..n {
        if i % 2 == 0 {
            out.push_str(&format!(
                "  # owner: team-{i}\n  svc{i}:\n    serviceVersion: v1.{i}.0\n"
            ));
        } else {
            out.push_str(&format!(
                "  svc{i}:\n    podspec:\n      containers:\n        - name: app\n          tag: v1.{i}.0 # pinned\n          env:\n            - name: MODE\n              value: prod\n"
            ));
        }
    }
    out
}

fn bumped(n: usize) -> ServiceMap {
    service_map((0..n).step_by(3).map(|i| (format!("svc{i}"), format!("v2.{i}.0"))))
}

fn bench_parse_serialize(c: &mut Criterion) {
    let source = sample_manifest(200);
    let mut group = c.benchmark_group("document");
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("parse", |b| {
        b.iter(|| pinsync::document::parse(black_box(source.as_bytes())).unwrap())
    });

    let tree = pinsync::document::parse(source.as_bytes()).unwrap();
    group.bench_function("serialize", |b| {
        b.iter(|| pinsync::document::serialize(black_box(&tree)))
    });

    group.finish();
}

fn bench_load(c: &mut Criterion) {
    let source = sample_manifest(200);
    let doc = ManifestDocument::parse(source.as_bytes()).unwrap();

    c.bench_function("manifest_load", |b| {
        b.iter(|| black_box(&doc).load().unwrap())
    });
}

fn bench_replace(c: &mut Criterion) {
    let mut group = c.benchmark_group("manifest_replace");
    for n in [20usize, 200, 1000] {
        let source = sample_manifest(n);
        let doc = ManifestDocument::parse(source.as_bytes()).unwrap();
        let desired = bumped(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &desired, |b, desired| {
            b.iter(|| {
                let mut doc = doc.clone();
                doc.replace(black_box(desired)).unwrap();
                black_box(doc.content())
            })
        });
    }
    group.finish();
}

fn bench_compare(c: &mut Criterion) {
    let a = PlatformSnapshot::new(
        Release::new("v1.0.0"),
        service_map((0..500).map(|i| (format!("svc{i}"), "v1".to_string()))),
    );
    let b = PlatformSnapshot::new(
        Release::new("v1.1.0"),
        service_map((100..600).map(|i| (format!("svc{i}"), if i % 7 == 0 { "v2" } else { "v1" }.to_string()))),
    );

    c.bench_function("compare_snapshots", |bench| {
        bench.iter(|| pinsync::compare(black_box(&a), black_box(&b)))
    });
}

criterion_group!(benches, bench_parse_serialize, bench_load, bench_replace, bench_compare);
criterion_main!(benches);
