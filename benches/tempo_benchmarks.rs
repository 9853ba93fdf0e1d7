use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::TempDir;
use tempo::common::test_utils::{generate_series, meas};
use tempo::storage::page_constants::{MEAS_SIZE, PAGE_HEADER_SIZE};
use tempo::{Id, Meas, Storage};

const PAGE_RECORDS: usize = 100_000;
const SERIES_IDS: Id = 64;

fn page_size() -> u64 {
    (PAGE_HEADER_SIZE + PAGE_RECORDS * MEAS_SIZE) as u64
}

fn filled_storage(dir: &TempDir, count: u64) -> Storage {
    let storage = Storage::create(dir.path().join("bench.tempo"), page_size()).unwrap();
    storage.append_batch(&generate_series(SERIES_IDS, count, 1)).unwrap();
    storage
}

fn benchmark_append(c: &mut Criterion) {
    c.bench_function("append_10k", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let storage = Storage::create(dir.path().join("bench.tempo"), page_size()).unwrap();
                (dir, storage)
            },
            |(_dir, storage)| {
                for t in 0..10_000u64 {
                    storage.append(&meas(t % SERIES_IDS, t)).unwrap();
                }
            },
            BatchSize::PerIteration,
        )
    });

    let batch = generate_series(SERIES_IDS, 10_000, 1);
    c.bench_function("append_batch_10k", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().unwrap();
                let storage = Storage::create(dir.path().join("bench.tempo"), page_size()).unwrap();
                (dir, storage)
            },
            |(_dir, storage)| storage.append_batch(&batch).unwrap(),
            BatchSize::PerIteration,
        )
    });
}

fn benchmark_read_interval(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let storage = filled_storage(&dir, 250_000);
    let mut rng = StdRng::seed_from_u64(7);

    c.bench_function("read_interval_window", |b| {
        b.iter(|| {
            let from = rng.gen_range(1..240_000u64);
            let ids: Vec<Id> = (0..4).map(|_| rng.gen_range(0..SERIES_IDS)).collect();
            let values: Vec<Meas> = storage
                .read_interval(&ids, 0, 0, from, from + 5_000)
                .unwrap()
                .read_all()
                .unwrap();
            values.len()
        })
    });
}

fn benchmark_cur_values(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let storage = filled_storage(&dir, 50_000);
    let ids: Vec<Id> = (0..SERIES_IDS).collect();

    c.bench_function("cur_values_all_ids", |b| {
        b.iter(|| storage.cur_values(&ids).unwrap().len())
    });
}

criterion_group!(
    benches,
    benchmark_append,
    benchmark_read_interval,
    benchmark_cur_values
);
criterion_main!(benches);
