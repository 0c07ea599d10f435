//! DICOMDIR lookup.
//!
//! ```text
//! PATIENT
//!   STUDY
//!     SERIES (0020,000E)          -> new DicomSeries
//!       IMAGE (0004,1500) ...     -> instance of the current series
//! ```

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use super::file::DicomFile;
use super::series::{DicomInstance, DicomSeries};
use super::tag;
use crate::jobs::Observer;
use crate::logger::Logger;

/// Record type opening a series
const SERIES_RECORD: &str = "SERIES";

/// Path of the DICOMDIR file of `folder`, if any.
pub fn dicomdir_path(folder: &Path) -> Option<PathBuf> {
    ["DICOMDIR", "dicomdir"]
        .iter()
        .map(|name| folder.join(name))
        .find(|path| path.is_file())
}

/// Read the series listed in the DICOMDIR of `folder`.
///
/// Records are walked in file order. Referenced files that do not exist or
/// that point outside `folder` are logged as warnings and skipped; series left
/// without instance are dropped.
///
/// # Returns
/// The series found; empty when `folder` has no usable DICOMDIR. An
/// unreadable DICOMDIR is logged as a warning so the caller can fall back to
/// the file search.
pub fn read_dicomdir(folder: &Path, observer: &Observer, logger: &Logger) -> Vec<DicomSeries> {
    let Some(path) = dicomdir_path(folder) else {
        debug!(folder = %folder.display(), "no DICOMDIR");
        return Vec::new();
    };

    let dicomdir = match DicomFile::open(&path) {
        Ok(dicomdir) => dicomdir,
        Err(e) => {
            logger.warning(format!("The DICOMDIR {} cannot be read: {e}", path.display()));
            return Vec::new();
        }
    };
    if !dicomdir.is_dicomdir() {
        logger.warning(format!(
            "{} is not a media storage directory",
            path.display()
        ));
        return Vec::new();
    }

    let records = dicomdir.records();
    observer.set_total_work_units(records.len() as u64);

    let mut series_list: Vec<DicomSeries> = Vec::new();
    let mut seen_instances = HashSet::new();

    for (index, record) in records.iter().enumerate() {
        if observer.cancel_requested() {
            break;
        }
        observer.done_work(index as u64 + 1);

        let record_type = record.string(tag::DIRECTORY_RECORD_TYPE).unwrap_or_default();
        if record_type == SERIES_RECORD {
            let uid = record.string(tag::SERIES_INSTANCE_UID).unwrap_or_default();
            series_list.push(DicomSeries::new(uid));
            continue;
        }

        let file_id = record.strings(tag::REFERENCED_FILE_ID);
        if file_id.is_empty() {
            // PATIENT, STUDY and private records.
            continue;
        }

        let Some(series) = series_list.last_mut() else {
            logger.warning(format!(
                "{record_type} record {} found outside of any series",
                file_id.join("/")
            ));
            continue;
        };

        let Some(instance_path) = referenced_path(folder, &file_id) else {
            logger.warning(format!(
                "The file {} referenced by the DICOMDIR is outside of {}",
                file_id.join("/"),
                folder.display()
            ));
            continue;
        };
        if !instance_path.is_file() {
            logger.warning(format!(
                "The file {} referenced by the DICOMDIR does not exist",
                instance_path.display()
            ));
            continue;
        }

        let sop_instance_uid = record
            .string(tag::REFERENCED_SOP_INSTANCE_UID_IN_FILE)
            .unwrap_or_default();
        if !sop_instance_uid.is_empty() && !seen_instances.insert(sop_instance_uid.clone()) {
            logger.warning(format!(
                "The instance {sop_instance_uid} is referenced twice in the DICOMDIR"
            ));
            continue;
        }

        series.add_instance(DicomInstance {
            path: instance_path,
            sop_class_uid: record
                .string(tag::REFERENCED_SOP_CLASS_UID_IN_FILE)
                .unwrap_or_default(),
            sop_instance_uid,
            instance_number: record.integer(tag::INSTANCE_NUMBER),
        });
    }

    series_list.retain(|series| {
        if series.is_empty() {
            debug!(series = %series.instance_uid, "DICOMDIR series without instance dropped");
        }
        !series.is_empty()
    });

    series_list
}

/// Join the components of a Referenced File ID onto `folder`.
///
/// Returns `None` unless every component is a plain file or directory name.
fn referenced_path(folder: &Path, file_id: &[String]) -> Option<PathBuf> {
    let mut path = folder.to_path_buf();
    for part in file_id {
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => path.push(name),
            _ => return None,
        }
    }
    Some(path)
}
