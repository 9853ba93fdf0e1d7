//! Integration tests for tempo
//!
//! These tests drive a whole storage directory through the public API.

mod integration;

use integration::{ErrorTester, TestEnvironment};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use tempo::common::logging;
use tempo::common::test_utils::{meas, sorted};
use tempo::{Meas, Storage, VERSION};

#[test]
fn test_version_and_logging_integration() {
    let env = TestEnvironment::new().expect("Should create test environment");

    assert!(!VERSION.is_empty());
    tempo::tempo_info!("Integration test starting in {:?}", env.db_path());
    tempo::tempo_debug!("Version: {}", VERSION);
}

#[test]
fn test_page_rotation_scenario() -> anyhow::Result<()> {
    let env = TestEnvironment::new()?;
    let storage = env.create_storage(2)?;

    storage.append(&meas(1, 1))?;
    storage.append(&meas(1, 2))?;
    storage.append(&meas(1, 10))?;

    let reader = storage.read_interval(&[1], 0, 0, 0, 5)?;
    assert_eq!(reader.pages_left(), 1);
    assert_eq!(reader.read_all()?, vec![meas(1, 1), meas(1, 2)]);

    let infos = env.page_infos()?;
    assert_eq!(infos.len(), 2);
    let mut counts: Vec<u64> = infos.iter().map(|p| p.header.write_pos).collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 2]);
    Ok(())
}

#[test]
fn test_cache_overflow_scenario() -> anyhow::Result<()> {
    let env = TestEnvironment::new()?;
    let storage = env.create_storage_with(20_000, 2, 9999)?;

    let batch: Vec<Meas> = (0..10_000).map(|id| meas(id, 1)).collect();
    for value in &batch {
        assert_eq!(storage.append(value)?.written, 1);
    }
    assert_eq!(storage.buffered(), 1);

    let stored = storage.read_interval_all(1, 1)?.read_all()?;
    assert_eq!(sorted(stored), sorted(batch));
    Ok(())
}

#[test]
fn test_current_values_missing_id() -> anyhow::Result<()> {
    let env = TestEnvironment::new()?;
    let storage = env.create_storage(16)?;

    storage.append_batch(&[meas(1, 1), meas(2, 1), meas(1, 5)])?;
    let values = storage.cur_values(&[1, 2, 3])?;
    assert_eq!(values, vec![meas(1, 5), meas(2, 1)]);
    Ok(())
}

#[test]
fn test_reopen_resumes_latest_page() -> anyhow::Result<()> {
    let env = TestEnvironment::new()?;
    {
        let mut storage = env.create_storage(8)?;
        storage.append_batch(&[meas(1, 1), meas(2, 2), meas(3, 3)])?;
        storage.close()?;
    }

    let storage = Storage::open(env.db_path())?;
    storage.append_batch(&[meas(1, 4), meas(2, 5)])?;
    let values = storage.read_interval_all(0, 100)?.read_all()?;
    assert_eq!(
        values,
        vec![meas(1, 1), meas(2, 2), meas(3, 3), meas(1, 4), meas(2, 5)]
    );
    assert_eq!(env.page_files()?.len(), 1);
    Ok(())
}

#[test]
fn test_reopen_full_page_starts_new_one() -> anyhow::Result<()> {
    let env = TestEnvironment::new()?;
    {
        let mut storage = env.create_storage(2)?;
        storage.append_batch(&[meas(1, 1), meas(1, 2)])?;
        storage.close()?;
    }

    let storage = Storage::open(env.db_path())?;
    storage.append(&meas(1, 3))?;
    storage.write_cache()?;
    assert_eq!(storage.cur_values(&[1])?, vec![meas(1, 3)]);
    assert_eq!(env.page_files()?.len(), 2);
    Ok(())
}

#[test]
fn test_cur_values_fall_back_to_older_pages() -> anyhow::Result<()> {
    let env = TestEnvironment::new()?;
    {
        let mut storage = env.create_storage(4)?;
        storage.append(&meas(5, 1))?;
        for t in 2..=20 {
            storage.append(&meas(1, t))?;
        }
        storage.close()?;
    }

    let storage = Storage::open(env.db_path())?;
    let values = storage.cur_values(&[5, 1])?;
    assert_eq!(values, vec![meas(5, 1), meas(1, 20)]);
    Ok(())
}

#[test]
fn test_open_missing_storage() {
    let env = TestEnvironment::new().unwrap();
    ErrorTester::assert_not_found(|| Storage::open(env.db_path()));
}

#[test]
fn test_concurrent_appends() -> anyhow::Result<()> {
    let env = TestEnvironment::new()?;
    let storage = Arc::new(env.create_storage_with(256, 2, 100)?);

    let handles: Vec<_> = (1..=4)
        .map(|id| {
            let storage = Arc::clone(&storage);
            thread::spawn(move || -> tempo::Result<()> {
                for t in 1..=500 {
                    storage.append(&meas(id, t))?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("appender panicked")?;
    }

    let stored = storage.read_interval_all(0, 1000)?.read_all()?;
    let expected: Vec<Meas> = (1..=4)
        .flat_map(|id| (1..=500).map(move |t| meas(id, t)))
        .collect();
    assert_eq!(sorted(stored), sorted(expected));
    Ok(())
}

#[test]
fn test_timer_integration() {
    let _env = TestEnvironment::new().expect("Should create test environment");

    let timer = logging::Timer::start("integration_test_timer");
    std::thread::sleep(std::time::Duration::from_millis(1));

    let elapsed = timer.stop();
    assert!(elapsed >= std::time::Duration::from_millis(1));
}
