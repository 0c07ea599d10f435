//! Recursive search for DICOM files.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use super::file::is_dicom_file;
use crate::error::DicomError;
use crate::jobs::Observer;
use crate::logger::Logger;

/// Collect every file under `folder` carrying the `DICM` prefix.
///
/// Entries are visited in file name order. Unreadable entries are logged as
/// warnings and skipped. The walk stops early when `observer` is canceled.
///
/// # Errors
/// `FolderNotFound` if `folder` is not a directory.
pub fn search_recursively(
    folder: &Path,
    observer: &Observer,
    logger: &Logger,
) -> Result<Vec<PathBuf>, DicomError> {
    if !folder.is_dir() {
        return Err(DicomError::FolderNotFound(folder.to_path_buf()));
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(folder)
        .follow_links(false)
        .sort_by_file_name()
    {
        if observer.cancel_requested() {
            debug!(folder = %folder.display(), "search canceled");
            break;
        }
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                candidates.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => logger.warning(format!("Unable to access an entry of {}: {e}", folder.display())),
        }
    }

    observer.set_total_work_units(candidates.len() as u64);
    let mut files = Vec::new();
    for (index, path) in candidates.into_iter().enumerate() {
        if observer.cancel_requested() {
            break;
        }
        if is_dicom_file(&path) {
            files.push(path);
        }
        observer.done_work(index as u64 + 1);
    }

    debug!(
        folder = %folder.display(),
        count = files.len(),
        "DICOM files found"
    );
    Ok(files)
}
