//! Tests for memory-mapped pages

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;
use tempo::common::test_utils::{meas, sorted};
use tempo::storage::page_constants::{MEAS_SIZE, PAGE_HEADER_SIZE};
use tempo::storage::Page;
use tempo::{Meas, QueryFilter};

fn page_size(records: usize) -> u64 {
    (PAGE_HEADER_SIZE + records * MEAS_SIZE) as u64
}

fn arb_meas() -> impl Strategy<Value = Meas> {
    (0u64..50, 0u64..10_000).prop_map(|(id, time)| meas(id, time))
}

proptest! {
    #[test]
    fn prop_header_tracks_true_bounds(values in prop::collection::vec(arb_meas(), 1..64)) {
        let dir = TempDir::new().unwrap();
        let mut page = Page::create(dir.path().join("p.page"), page_size(64)).unwrap();
        for value in &values {
            prop_assert!(page.append(value).unwrap());
        }

        let header = *page.header();
        prop_assert_eq!(header.write_pos, values.len() as u64);
        prop_assert_eq!(header.min_time, values.iter().map(|m| m.time).min().unwrap());
        prop_assert_eq!(header.max_time, values.iter().map(|m| m.time).max().unwrap());
        prop_assert_eq!(header.min_id, values.iter().map(|m| m.id).min().unwrap());
        prop_assert_eq!(header.max_id, values.iter().map(|m| m.id).max().unwrap());
    }

    #[test]
    fn prop_full_range_round_trip(
        batches in prop::collection::vec(prop::collection::vec(arb_meas(), 1..8), 1..8)
    ) {
        let dir = TempDir::new().unwrap();
        let mut page = Page::create(dir.path().join("p.page"), page_size(64)).unwrap();
        let mut appended = Vec::new();
        for batch in &batches {
            page.append_batch(batch).unwrap();
            appended.extend_from_slice(batch);
        }

        let (from, to) = (page.min_time(), page.max_time());
        let read = page.read_interval(&QueryFilter::all(), from, to).unwrap();
        prop_assert_eq!(sorted(read), sorted(appended));
    }
}

#[test]
fn test_inclusive_bounds_single_record() {
    let dir = TempDir::new().unwrap();
    let mut page = Page::create(dir.path().join("p.page"), page_size(8)).unwrap();
    page.append(&meas(1, 5)).unwrap();
    page.append(&meas(1, 7)).unwrap();
    page.append(&meas(1, 9)).unwrap();

    assert_eq!(page.read_interval_all(7, 7).unwrap(), vec![meas(1, 7)]);
    assert!(page.read_interval_all(6, 6).unwrap().is_empty());
}

#[test]
fn test_read_only_reads_are_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("p.page");
    let mut writer = Page::create(&path, page_size(32)).unwrap();
    writer
        .append_batch(&(0..20).map(|t| meas(t % 3, t)).collect::<Vec<_>>())
        .unwrap();

    let filter = QueryFilter::new(&[1, 2], 0, 0);
    let first = Page::open(&path, true).unwrap();
    let second = Page::open(&path, true).unwrap();
    let a = first.read_interval(&filter, 4, 15).unwrap();
    let b = second.read_interval(&filter, 4, 15).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, first.read_interval(&filter, 4, 15).unwrap());
    assert!(a.iter().all(|m| m.id != 0 && (4..=15).contains(&m.time)));
}

#[test]
fn test_reader_snapshot_ignores_later_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("p.page");
    let mut writer = Page::create(&path, page_size(8)).unwrap();
    writer.append(&meas(1, 1)).unwrap();

    let reader = Page::open(&path, true).unwrap();
    writer.append(&meas(1, 2)).unwrap();

    assert_eq!(reader.read_interval_all(0, 10).unwrap(), vec![meas(1, 1)]);
    assert_eq!(writer.read_interval_all(0, 10).unwrap().len(), 2);
}

#[test]
fn test_checksum_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("p.page");
    {
        let mut page = Page::create(&path, page_size(8)).unwrap();
        page.append_batch(&[meas(1, 1), meas(2, 2)]).unwrap();
    }

    let page = Page::open(&path, true).unwrap();
    assert!(!page.header().is_open());
    assert!(page.verify_checksum());
}
