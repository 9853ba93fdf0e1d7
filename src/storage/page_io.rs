//! File-level helpers: header reads without mapping, directory listing and removal

use crate::common::error::{Error, Result};
use crate::storage::page_constants::PAGE_HEADER_SIZE;
use crate::storage::page_header::PageHeader;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read a page header with plain file I/O
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is shorter than a header.
pub fn read_header<P: AsRef<Path>>(path: P) -> Result<PageHeader> {
    let path = path.as_ref();
    let mut file =
        File::open(path).map_err(|e| Error::io(format!("can't open {}: {e}", path.display())))?;
    let mut buf = [0u8; PAGE_HEADER_SIZE];
    file.read_exact(&mut buf)
        .map_err(|e| Error::corruption(format!("{}: short header: {e}", path.display())))?;
    Ok(bytemuck::pod_read_unaligned(&buf))
}

/// Files directly inside `dir` whose extension is `extension`, sorted by name
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn ls<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
    let mut result = Vec::new();
    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Remove a file or a directory tree
///
/// # Errors
///
/// Returns an error if removal fails; a missing path is not an error.
pub fn rm<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(());
    }
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}
