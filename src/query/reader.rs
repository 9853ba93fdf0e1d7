//! Cross-page interval cursor with as-of gap-fill at the interval start
//!
//! A [`StorageReader`] walks the selected pages one at a time, delegating each
//! to a [`PageReader`]. When the query start falls inside a page (the
//! boundary page), that page's output is also kept aside. Once the page is
//! exhausted, every requested id without a value at or before `from` is
//! looked up in the older part of the boundary page, then in the write
//! window of the page preceding it and finally in the pages before that.
//! Values found this way are placed at the front of the output.

use crate::common::error::Result;
use crate::query::selection::PageSelection;
use crate::storage::page::Page;
use crate::storage::page_manager::PageInfo;
use crate::storage::page_reader::PageReader;
use crate::tempo_trace;
use crate::types::{Id, Meas, QueryFilter, Time};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Single-use forward cursor over the result of an interval query
#[derive(Debug)]
pub struct StorageReader {
    pages: VecDeque<PathBuf>,
    filter: QueryFilter,
    from: Time,
    to: Time,
    prev_interval_page: Option<PathBuf>,
    older_pages: Vec<PageInfo>,
    fill_gaps: bool,
    current: Option<PageReader>,
    on_boundary: bool,
    local_result: Vec<Meas>,
    resolved: HashSet<Id>,
}

impl StorageReader {
    /// Cursor over the pages of `selection`
    pub fn new(selection: PageSelection, filter: QueryFilter, from: Time, to: Time) -> Self {
        Self {
            pages: selection.pages.into(),
            filter,
            from,
            to,
            prev_interval_page: selection.prev_interval_page,
            older_pages: selection.older_pages,
            fill_gaps: selection.fill_gaps,
            current: None,
            on_boundary: false,
            local_result: Vec::new(),
            resolved: HashSet::new(),
        }
    }

    /// No page left to read and none in progress
    pub fn is_end(&self) -> bool {
        self.pages.is_empty() && self.current.is_none()
    }

    /// Pages not yet opened
    pub fn pages_left(&self) -> usize {
        self.pages.len()
    }

    /// Query start
    pub fn from(&self) -> Time {
        self.from
    }

    /// Query end
    pub fn to(&self) -> Time {
        self.to
    }

    /// Advance by one index run, appending matches to `output`
    ///
    /// Gap-fill values of a finished boundary page are inserted at the
    /// front of `output`.
    ///
    /// # Errors
    ///
    /// Returns an error if a page cannot be opened, or `Error::ReadInterval`
    /// if a page index points at slots that cannot be read.
    pub fn read_next(&mut self, output: &mut Vec<Meas>) -> Result<()> {
        if self.current.is_none() {
            let Some(path) = self.pages.pop_front() else {
                return Ok(());
            };
            let page = Page::open(&path, true)?;
            self.on_boundary = self.fill_gaps
                && page.header().min_max_initialized()
                && page.min_time() <= self.from;
            self.local_result.clear();
            tempo_trace!("Reading {} (boundary: {})", path.display(), self.on_boundary);
            self.current = Some(page.into_reader(self.filter.clone(), self.from, self.to)?);
        }

        let Some(reader) = self.current.as_mut() else {
            return Ok(());
        };
        if self.on_boundary {
            let start = self.local_result.len();
            reader.read_next(&mut self.local_result)?;
            output.extend_from_slice(&self.local_result[start..]);
        } else {
            reader.read_next(output)?;
        }

        if reader.is_end() {
            if let Some(done) = self.current.take() {
                if self.on_boundary {
                    let filled = read_not_interval_data(
                        done.page(),
                        self.prev_interval_page.as_deref(),
                        &self.older_pages,
                        &self.filter,
                        self.from,
                        &self.local_result,
                        &mut self.resolved,
                    )?;
                    output.splice(0..0, filled);
                }
            }
        }
        Ok(())
    }

    /// Drain the cursor
    ///
    /// # Errors
    ///
    /// Same as [`StorageReader::read_next`].
    pub fn read_all(mut self) -> Result<Vec<Meas>> {
        let mut output = Vec::new();
        while !self.is_end() {
            self.read_next(&mut output)?;
        }
        Ok(output)
    }
}

/// Values at or before `from` for ids the boundary page left unresolved
///
/// An id is unresolved when it was requested, or seen only after `from`,
/// and no value at or before `from` has been produced for it yet. The older
/// part of `boundary` is searched first, keeping the latest value per id.
/// Ids still missing are taken from the write window of
/// `prev_interval_page`, then from the windows of `older_pages` whose id
/// range can hold them, newest first and subject to the filter's tags.
/// Returned values are ordered by time and recorded in `resolved`.
pub(crate) fn read_not_interval_data(
    boundary: &Page,
    prev_interval_page: Option<&Path>,
    older_pages: &[PageInfo],
    filter: &QueryFilter,
    from: Time,
    local_result: &[Meas],
    resolved: &mut HashSet<Id>,
) -> Result<Vec<Meas>> {
    let mut unresolved: BTreeSet<Id> = filter.ids().iter().copied().collect();
    for value in local_result {
        if value.time <= from {
            resolved.insert(value.id);
        } else {
            unresolved.insert(value.id);
        }
    }
    unresolved.retain(|id| !resolved.contains(id));
    if unresolved.is_empty() {
        return Ok(Vec::new());
    }

    let mut filled: BTreeMap<Id, Meas> = BTreeMap::new();
    if boundary.min_time() <= from {
        let ids: Vec<Id> = unresolved.iter().copied().collect();
        let older = boundary.read_interval(&filter.with_ids(&ids), boundary.min_time(), from)?;
        for value in older {
            let newer = filled.get(&value.id).map_or(true, |cur| value.time >= cur.time);
            if newer {
                filled.insert(value.id, value);
            }
        }
        for id in filled.keys() {
            unresolved.remove(id);
        }
    }

    if let Some(prev) = prev_interval_page.filter(|p| *p != boundary.path()) {
        if !unresolved.is_empty() {
            let page = Page::open(prev, true)?;
            fill_from_window(&page, filter, from, &mut unresolved, &mut filled);
        }
    }

    for info in older_pages {
        let (Some(lo), Some(hi)) = (unresolved.first().copied(), unresolved.last().copied()) else {
            break;
        };
        if !info.header.intersects_ids(lo, hi) {
            continue;
        }
        let page = Page::open(&info.path, true)?;
        fill_from_window(&page, filter, from, &mut unresolved, &mut filled);
    }

    resolved.extend(filled.keys());
    let mut values: Vec<Meas> = filled.into_values().collect();
    values.sort_by_key(|m| (m.time, m.id));
    Ok(values)
}

/// Take the newest value at or before `from` of each unresolved id in the
/// write window of `page`
fn fill_from_window(
    page: &Page,
    filter: &QueryFilter,
    from: Time,
    unresolved: &mut BTreeSet<Id>,
    filled: &mut BTreeMap<Id, Meas>,
) {
    for value in page.write_window() {
        if unresolved.is_empty() {
            break;
        }
        if value.time <= from && filter.check_flags(value) && unresolved.remove(&value.id) {
            filled.insert(value.id, *value);
        }
    }
}
