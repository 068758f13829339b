use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use iploc::{Locator, LocatorRegistry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use std::sync::Arc;

#[path = "../tests/common/mod.rs"]
mod common;

use common::DatabaseWriter;

/// Database with `count` evenly spaced ranges and a few hundred distinct records
fn generate_database(count: u32) -> Vec<u8> {
    let mut writer = DatabaseWriter::new();
    let step = u32::MAX / count;
    for i in 0..count {
        let last = if i + 1 == count { u32::MAX } else { (i + 1) * step - 1 };
        let record = match i % 3 {
            0 => format!("C{}\tRegion{}\tCity{}\t", i % 200, i % 31, i % 97),
            1 => format!("C{}\tRegion{}\tCity{}\t\tISP{}", i % 200, i % 31, i % 97, i % 13),
            _ => format!(
                "C{}\tRegion{}\tCity{}\tISP{}\t{}\t{}\t{}\t{}\t{}\t",
                i % 200,
                i % 31,
                i % 97,
                i % 13,
                i % 200,
                i % 31,
                i % 97,
                i % 13,
                i % 1000
            ),
        };
        writer.add_range_u32(last, &record);
    }
    writer.build()
}

fn random_addresses(count: usize) -> Vec<u32> {
    let mut rng = StdRng::seed_from_u64(0x1910c);
    (0..count).map(|_| rng.random::<u32>()).collect()
}

fn bench_lookup(c: &mut Criterion) {
    let addrs = random_addresses(1000);
    let mut group = c.benchmark_group("lookup");
    group.throughput(Throughput::Elements(addrs.len() as u64));

    for ranges in [1_000u32, 100_000, 1_000_000] {
        let locator = Locator::from_bytes(generate_database(ranges)).unwrap();

        group.bench_with_input(BenchmarkId::new("find_by_u32", ranges), &addrs, |b, addrs| {
            b.iter(|| {
                for &addr in addrs {
                    black_box(locator.find_by_u32(addr).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_text_lookup(c: &mut Criterion) {
    let locator = Locator::from_bytes(generate_database(100_000)).unwrap();
    let texts: Vec<String> = random_addresses(1000)
        .into_iter()
        .map(|a| std::net::Ipv4Addr::from(a).to_string())
        .collect();

    let mut group = c.benchmark_group("text_lookup");
    group.throughput(Throughput::Elements(texts.len() as u64));
    group.bench_function("find", |b| {
        b.iter(|| {
            for text in &texts {
                black_box(locator.find(text).unwrap());
            }
        });
    });
    group.finish();
}

fn bench_registry(c: &mut Criterion) {
    let addrs = random_addresses(1000);
    let registry = Arc::new(LocatorRegistry::new());
    registry.initialize(generate_database(100_000)).unwrap();

    let mut group = c.benchmark_group("registry");
    group.throughput(Throughput::Elements(addrs.len() as u64));

    group.bench_function("lookup_u32", |b| {
        b.iter(|| {
            for &addr in &addrs {
                black_box(registry.lookup_u32(addr).unwrap());
            }
        });
    });

    group.bench_function("snapshot_then_find", |b| {
        b.iter(|| {
            let snapshot = registry.snapshot().unwrap();
            for &addr in &addrs {
                black_box(snapshot.find_by_u32(addr).unwrap());
            }
        });
    });

    group.finish();
}

fn bench_reload(c: &mut Criterion) {
    let data = generate_database(100_000);
    let registry = LocatorRegistry::new();
    registry.initialize(data.clone()).unwrap();

    c.bench_function("reload_100k_ranges", |b| {
        b.iter(|| black_box(registry.reload(data.clone()).unwrap()));
    });
}

criterion_group!(benches, bench_lookup, bench_text_lookup, bench_registry, bench_reload);
criterion_main!(benches);
