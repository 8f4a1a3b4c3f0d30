//! Storage file benchmarks.

use chatsync_bench::store;
use chatsync_store::{PersistenceManager, Store};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::TempDir;

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let store = store(20, 500, 256);
    let bytes = store.encode().unwrap();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("encode_10k_records", |b| {
        b.iter(|| black_box(store.encode().unwrap()));
    });
    group.bench_function("decode_10k_records", |b| {
        b.iter(|| black_box(Store::decode(black_box(&bytes)).unwrap()));
    });
    group.finish();
}

fn bench_save(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let manager = PersistenceManager::new(dir.path().join("storage.json"));
    let store = store(20, 500, 256);

    let mut group = c.benchmark_group("save");
    group.sample_size(20);
    group.bench_function("atomic_save_10k_records", |b| {
        b.iter(|| manager.save(&store).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_save);
criterion_main!(benches);
