//! Run-by-run interval cursor over one page

use crate::common::error::Result;
use crate::storage::page::{Page, ScanRun};
use crate::types::{Meas, QueryFilter, Time};
use std::collections::VecDeque;

/// Interval read over an owned page, producing one index run per step
#[derive(Debug)]
pub struct PageReader {
    page: Page,
    filter: QueryFilter,
    from: Time,
    to: Time,
    runs: VecDeque<ScanRun>,
}

impl PageReader {
    pub(crate) fn new(page: Page, filter: QueryFilter, from: Time, to: Time) -> Result<Self> {
        let runs = page.plan_interval(&filter, from, to)?;
        Ok(Self {
            page,
            filter,
            from,
            to,
            runs,
        })
    }

    /// Page being read
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Every run has been produced
    pub fn is_end(&self) -> bool {
        self.runs.is_empty()
    }

    /// Append the matches of the next run to `output`
    ///
    /// # Errors
    ///
    /// Returns `Error::ReadInterval` if the run points past the written slots.
    pub fn read_next(&mut self, output: &mut Vec<Meas>) -> Result<()> {
        if let Some(run) = self.runs.pop_front() {
            self.page
                .scan_run(&run, &self.filter, self.from, self.to, output)?;
        }
        Ok(())
    }

    /// Drain the remaining runs into `output`
    ///
    /// # Errors
    ///
    /// Same as [`PageReader::read_next`].
    pub fn read_to_end(&mut self, output: &mut Vec<Meas>) -> Result<()> {
        while !self.is_end() {
            self.read_next(output)?;
        }
        Ok(())
    }

    /// Flag and source tags of `value` match this reader's filter
    pub fn check_value_flags(&self, value: &Meas) -> bool {
        self.filter.check_flags(value)
    }
}
