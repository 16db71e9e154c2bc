use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;

/// Name, modification time and size of a saved GPX file.
///
/// Metadata is read from the filesystem on first access and cached; a failed
/// lookup is not cached, so a later call retries. Hosts without filesystem
/// access (the browser) pass the values in with [`GpxFileInfo::with_metadata`].
#[derive(Debug)]
pub struct GpxFileInfo {
    path: PathBuf,
    modified: OnceCell<DateTime<Utc>>,
    size: OnceCell<u64>,
}

impl GpxFileInfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            modified: OnceCell::new(),
            size: OnceCell::new(),
        }
    }

    pub fn with_metadata(path: impl Into<PathBuf>, modified: DateTime<Utc>, size: u64) -> Self {
        Self {
            path: path.into(),
            modified: OnceCell::with_value(modified),
            size: OnceCell::with_value(size),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without extension: `/path/to/walk.gpx` → `walk`.
    pub fn file_name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn modified_date(&self) -> Option<DateTime<Utc>> {
        self.modified
            .get_or_try_init(|| {
                std::fs::metadata(&self.path)
                    .and_then(|meta| meta.modified())
                    .map(DateTime::<Utc>::from)
            })
            .map_err(|e| log::debug!("No modification time for {}: {e}", self.path.display()))
            .ok()
            .copied()
    }

    pub fn file_size(&self) -> Option<u64> {
        self.size
            .get_or_try_init(|| std::fs::metadata(&self.path).map(|meta| meta.len()))
            .map_err(|e| log::debug!("No size for {}: {e}", self.path.display()))
            .ok()
            .copied()
    }
}
