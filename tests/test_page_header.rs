//! Tests for the on-disk page header

use bytemuck::bytes_of;
use std::mem::offset_of;
use tempfile::TempDir;
use tempo::common::test_utils::meas;
use tempo::storage::page_constants::{MEAS_SIZE, PAGE_HEADER_SIZE, PAGE_VERSION};
use tempo::storage::page_header::PageHeader;
use tempo::storage::page_io;
use tempo::storage::Page;

#[test]
fn test_page_header_size() {
    assert_eq!(std::mem::size_of::<PageHeader>(), PAGE_HEADER_SIZE);
    assert_eq!(PAGE_HEADER_SIZE % std::mem::align_of::<tempo::Meas>(), 0);
}

#[test]
fn test_version_is_first_byte() {
    assert_eq!(offset_of!(PageHeader, version), 0);

    let header = PageHeader::new(4096);
    assert_eq!(bytes_of(&header)[0], PAGE_VERSION);
}

#[test]
fn test_header_bytes_in_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("h.page");
    let size = (PAGE_HEADER_SIZE + 4 * MEAS_SIZE) as u64;
    {
        let mut page = Page::create(&path, size).unwrap();
        page.append_batch(&[meas(3, 30), meas(9, 10)]).unwrap();
    }

    let raw = std::fs::read(&path).unwrap();
    assert_eq!(raw.len() as u64, size);

    let at = |offset: usize| u64::from_ne_bytes(raw[offset..offset + 8].try_into().unwrap());
    assert_eq!(at(offset_of!(PageHeader, size)), size);
    assert_eq!(at(offset_of!(PageHeader, write_pos)), 2);
    assert_eq!(at(offset_of!(PageHeader, min_time)), 10);
    assert_eq!(at(offset_of!(PageHeader, max_time)), 30);
    assert_eq!(at(offset_of!(PageHeader, min_id)), 3);
    assert_eq!(at(offset_of!(PageHeader, max_id)), 9);

    let header = page_io::read_header(&path).unwrap();
    assert!(header.min_max_initialized());
    assert!(!header.is_open());
}

#[test]
fn test_open_marker_while_writing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("h.page");
    let page = Page::create(&path, (PAGE_HEADER_SIZE + MEAS_SIZE) as u64).unwrap();

    assert!(page_io::read_header(&path).unwrap().is_open());
    drop(page);
    assert!(!page_io::read_header(&path).unwrap().is_open());
}
