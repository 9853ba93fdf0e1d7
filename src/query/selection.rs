//! Choice of the pages an interval query has to visit

use crate::storage::page_manager::PageInfo;
use crate::types::{in_interval, Time};
use std::path::PathBuf;

/// Pages to scan for `[from, to]` plus what the reader needs for gap-fill
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelection {
    /// Pages in ascending time order, without duplicates
    pub pages: Vec<PathBuf>,
    /// Page preceding the first page that starts at or before `from`
    pub prev_interval_page: Option<PathBuf>,
    /// Boundary pages must be checked for values older than `from`
    pub fill_gaps: bool,
    /// Unselected pages ending before `from`, newest first, searched when the
    /// boundary and previous pages leave ids without an as-of value
    pub older_pages: Vec<PageInfo>,
}

impl PageSelection {
    fn include(&mut self, info: &PageInfo) {
        if !self.pages.contains(&info.path) {
            self.pages.push(info.path.clone());
        }
    }

    fn arm_gap_fill(&mut self, prev: Option<&PageInfo>) {
        if let Some(prev) = prev {
            self.prev_interval_page = Some(prev.path.clone());
        }
        self.fill_gaps = true;
    }
}

/// Select the pages covering `[from, to]` from `pages` sorted by time
///
/// Besides the pages overlapping the interval, the page right before the
/// interval start is kept whenever it may hold the last value of an id
/// before `from`. Gap-fill is armed whenever `from` falls inside or right
/// after a selected page, even without a preceding page.
pub fn select_pages(pages: &[PageInfo], from: Time, to: Time) -> PageSelection {
    if from > to {
        return PageSelection::default();
    }
    let pages: Vec<&PageInfo> = pages
        .iter()
        .filter(|p| p.header.min_max_initialized() && p.header.write_pos > 0)
        .collect();

    let mut selection = PageSelection::default();
    for (i, info) in pages.iter().enumerate() {
        let header = &info.header;
        let prev = i.checked_sub(1).map(|j| pages[j]);

        if header.contains_interval(from, to) {
            selection.include(info);
            selection.arm_gap_fill(prev);
        } else if let Some(prev) = prev.filter(|p| header.min_time > from && p.header.max_time <= from) {
            selection.include(prev);
            selection.include(info);
            selection.arm_gap_fill(Some(prev));
        } else if header.inside_interval(from, to) {
            selection.include(info);
        } else if in_interval(header.min_time, header.max_time, from) {
            selection.include(info);
            selection.arm_gap_fill(prev);
        } else if header.max_time >= to && header.min_time <= to {
            selection.include(info);
        }
    }

    if selection.fill_gaps {
        let mut older: Vec<PageInfo> = pages
            .iter()
            .filter(|p| p.header.min_time <= from)
            .filter(|p| !selection.pages.contains(&p.path))
            .filter(|p| selection.prev_interval_page.as_ref() != Some(&p.path))
            .map(|p| (*p).clone())
            .collect();
        older.sort_by(|a, b| b.header.max_time.cmp(&a.header.max_time));
        selection.older_pages = older;
    }
    selection
}
