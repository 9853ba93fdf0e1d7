//! Page lifecycle: the current writable page, rotation and page enumeration

use crate::common::config::StorageConfig;
use crate::common::error::{Error, Result};
use crate::storage::page::Page;
use crate::storage::page_constants::PAGE_EXTENSION;
use crate::storage::page_header::PageHeader;
use crate::storage::page_io;
use crate::{tempo_info, tempo_warn};
use std::path::{Path, PathBuf};

/// A page file and its header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// Page file path
    pub path: PathBuf,
    /// Header as stored on disk
    pub header: PageHeader,
}

/// Owns the current writable page of one storage directory
#[derive(Debug)]
pub struct PageManager {
    path: PathBuf,
    default_page_size: u64,
    check_page_open: bool,
    current: Option<Page>,
    name_counter: u64,
}

impl PageManager {
    /// Manage the pages in `path`
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if `path` is not a directory.
    pub fn start<P: AsRef<Path>>(path: P, config: &StorageConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::not_found(format!("{} not exists", path.display())));
        }
        Ok(Self {
            path: path.to_path_buf(),
            default_page_size: config.page_size,
            check_page_open: config.check_page_open,
            current: None,
            name_counter: 0,
        })
    }

    /// Close the current page
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be flushed.
    pub fn stop(&mut self) -> Result<()> {
        self.close_current_page()
    }

    /// Storage directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of newly created pages
    pub fn default_page_size(&self) -> u64 {
        self.default_page_size
    }

    /// Change the size of pages created from now on
    pub fn set_default_page_size(&mut self, size: u64) {
        self.default_page_size = size;
    }

    /// Page currently accepting appends
    pub fn cur_page(&self) -> Option<&Page> {
        self.current.as_ref()
    }

    /// Mutable access to the current page
    pub fn cur_page_mut(&mut self) -> Option<&mut Page> {
        self.current.as_mut()
    }

    /// Close the current page, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the page cannot be flushed.
    pub fn close_current_page(&mut self) -> Result<()> {
        if let Some(mut page) = self.current.take() {
            page.close()?;
        }
        Ok(())
    }

    /// Close the current page and start a new one
    ///
    /// # Errors
    ///
    /// Returns an error if closing the old page or creating the new one fails.
    pub fn create_new_page(&mut self) -> Result<&mut Page> {
        self.close_current_page()?;
        let path = self.next_page_name();
        let page = Page::create(&path, self.default_page_size)?;
        tempo_info!("Switched to new page {}", path.display());
        Ok(self.current.insert(page))
    }

    /// Current page if it has room, otherwise a freshly created one
    ///
    /// # Errors
    ///
    /// Returns an error if a new page has to be created and creation fails.
    pub fn writable_page(&mut self) -> Result<&mut Page> {
        let needs_new = self.current.as_ref().map_or(true, Page::is_full);
        if needs_new {
            return self.create_new_page();
        }
        self.current
            .as_mut()
            .ok_or_else(|| Error::internal("no current page"))
    }

    /// Make an existing page the current one
    ///
    /// A full page is closed again and replaced by a new page.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyOpen` when open checks are enabled and the page
    /// carries the open marker, or the errors of [`Page::open`].
    pub fn resume<P: AsRef<Path>>(&mut self, path: P) -> Result<&mut Page> {
        self.close_current_page()?;
        let page = self.open_writable(path.as_ref())?;
        if page.is_full() {
            drop(page);
            return self.create_new_page();
        }
        tempo_info!("Resumed writing into {}", path.as_ref().display());
        Ok(self.current.insert(page))
    }

    /// Open a page that is not the current page
    ///
    /// Read-only opens are always allowed, including duplicate opens of the
    /// current page.
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyOpen` for a writable open of the current page,
    /// or the errors of [`Page::open`].
    pub fn open<P: AsRef<Path>>(&self, path: P, read_only: bool) -> Result<Page> {
        let path = path.as_ref();
        if read_only {
            return Page::open(path, true);
        }
        if self.current.as_ref().is_some_and(|p| p.path() == path) {
            return Err(Error::already_open(path.display().to_string()));
        }
        self.open_writable(path)
    }

    fn open_writable(&self, path: &Path) -> Result<Page> {
        if self.check_page_open {
            Page::open_checked(path)
        } else {
            Page::open(path, false)
        }
    }

    /// Every page in the directory with its header, ascending by time
    ///
    /// Pages whose header cannot be read are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed.
    pub fn pages_by_time(&self) -> Result<Vec<PageInfo>> {
        let mut pages = Vec::new();
        for path in page_io::ls(&self.path, PAGE_EXTENSION)? {
            let header = match self.current.as_ref().filter(|p| p.path() == path) {
                Some(current) => *current.header(),
                None => match page_io::read_header(&path) {
                    Ok(header) => header,
                    Err(e) => {
                        tempo_warn!("Skipping unreadable page {}: {e}", path.display());
                        continue;
                    }
                },
            };
            pages.push(PageInfo { path, header });
        }
        pages.sort_by(|a, b| {
            (a.header.min_time, a.header.max_time, &a.path)
                .cmp(&(b.header.min_time, b.header.max_time, &b.path))
        });
        Ok(pages)
    }

    /// The most recently active page: the one with the greatest `max_time`
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the directory holds no pages.
    pub fn latest_page(&self) -> Result<PathBuf> {
        self.pages_by_time()?
            .into_iter()
            .max_by(|a, b| (a.header.max_time, &a.path).cmp(&(b.header.max_time, &b.path)))
            .map(|info| info.path)
            .ok_or_else(|| Error::not_found(format!("no pages in {}", self.path.display())))
    }

    /// Unused page file name derived from the wall clock plus a counter
    fn next_page_name(&mut self) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%6f").to_string();
        loop {
            self.name_counter += 1;
            let candidate = self.path.join(format!(
                "{stamp}_{:04}.{PAGE_EXTENSION}",
                self.name_counter
            ));
            if !candidate.exists() {
                return candidate;
            }
        }
    }
}
