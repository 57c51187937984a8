use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::tempdir;

use bloom::BloomFilterPolicy;
use sstable::{
    BlockCache, FsRandomAccessFile, FsWritableFile, Iter, Options, ReadOptions, Table,
    TableBuilder,
};

const N_KEYS: usize = 10_000;
const VALUE_SIZE: usize = 100;

fn bench_options() -> Options {
    Options {
        filter_policy: Some(Arc::new(BloomFilterPolicy::new(10))),
        block_cache: Some(Arc::new(BlockCache::new(8 << 20))),
        ..Options::default()
    }
}

fn entries() -> Vec<(Vec<u8>, Vec<u8>)> {
    (0..N_KEYS)
        .map(|i| (format!("key{:08}", i).into_bytes(), vec![b'x'; VALUE_SIZE]))
        .collect()
}

fn build_table(path: &std::path::Path, options: &Options) {
    let file = FsWritableFile::create(path).unwrap();
    let mut builder = TableBuilder::new(options.clone(), Box::new(file));
    for (key, value) in entries() {
        builder.add(&key, &value);
    }
    builder.finish().unwrap();
}

fn open_table(path: &std::path::Path, options: &Options) -> Arc<Table> {
    let size = std::fs::metadata(path).unwrap().len();
    let file = FsRandomAccessFile::open(path).unwrap();
    Arc::new(Table::open(options.clone(), Box::new(file), size).unwrap())
}

fn table_build_benchmark(c: &mut Criterion) {
    c.bench_function("table_build_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.sst");
                (dir, path)
            },
            |(_dir, path)| build_table(&path, &bench_options()),
            BatchSize::SmallInput,
        );
    });
}

fn table_get_hit_benchmark(c: &mut Criterion) {
    c.bench_function("table_get_hit_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.sst");
                let options = bench_options();
                build_table(&path, &options);
                (dir, open_table(&path, &options))
            },
            |(_dir, table)| {
                for i in 0..N_KEYS {
                    let key = format!("key{:08}", i).into_bytes();
                    let mut found = false;
                    table
                        .internal_get(&ReadOptions::default(), &key, |_, _| found = true)
                        .unwrap();
                    assert!(found);
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn table_get_miss_benchmark(c: &mut Criterion) {
    c.bench_function("table_get_miss_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.sst");
                let options = bench_options();
                build_table(&path, &options);
                (dir, open_table(&path, &options))
            },
            |(_dir, table)| {
                for i in 0..N_KEYS {
                    let key = format!("missing{:08}", i).into_bytes();
                    let mut hit = false;
                    table
                        .internal_get(&ReadOptions::default(), &key, |k, _| hit = k == key)
                        .unwrap();
                    assert!(!hit);
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn table_scan_benchmark(c: &mut Criterion) {
    c.bench_function("table_scan_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let path = dir.path().join("bench.sst");
                let options = bench_options();
                build_table(&path, &options);
                (dir, open_table(&path, &options))
            },
            |(_dir, table)| {
                let mut iter = table.new_iterator(ReadOptions::default());
                let mut count = 0usize;
                iter.seek_to_first();
                while iter.valid() {
                    count += 1;
                    iter.next();
                }
                assert_eq!(count, N_KEYS);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    table_build_benchmark,
    table_get_hit_benchmark,
    table_get_miss_benchmark,
    table_scan_benchmark
);
criterion_main!(benches);
