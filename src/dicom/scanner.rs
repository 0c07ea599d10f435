//! Grouping of files into series and series completion.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::debug;

use super::file::DicomFile;
use super::series::{DicomInstance, DicomSeries};
use super::tag;
use crate::data::{Equipment, Patient, Study};
use crate::error::DicomError;
use crate::jobs::Observer;
use crate::logger::Logger;

fn percent(done: usize, total: usize) -> u64 {
    if total == 0 {
        100
    } else {
        (done * 100 / total) as u64
    }
}

/// Builds [`DicomSeries`] from files.
///
/// Patient, study and equipment modules are cached by patient id, study
/// instance uid and institution name for the duration of one
/// [`fill_series`](SeriesScanner::fill_series) call.
#[derive(Debug)]
pub struct SeriesScanner {
    logger: Logger,
    patients: HashMap<String, Patient>,
    studies: HashMap<String, Study>,
    equipments: HashMap<String, Equipment>,
}

impl SeriesScanner {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            patients: HashMap::new(),
            studies: HashMap::new(),
            equipments: HashMap::new(),
        }
    }

    /// Split files into series then complete them.
    pub fn read(
        &mut self,
        files: &[PathBuf],
        reader_observer: &Observer,
        complete_observer: &Observer,
    ) -> Result<Vec<DicomSeries>, DicomError> {
        let mut series = self.split_files(files, reader_observer)?;
        self.fill_series(&mut series, complete_observer);
        Ok(series)
    }

    /// Group files by SeriesInstanceUID.
    ///
    /// Files are visited in file name order. Unreadable files, DICOMDIR
    /// files and duplicate SOP instances are skipped; series appear in the
    /// order their first file was visited. Progress is reported in percent.
    pub fn split_files(
        &mut self,
        files: &[PathBuf],
        observer: &Observer,
    ) -> Result<Vec<DicomSeries>, DicomError> {
        let mut ordered: Vec<&PathBuf> = files.iter().collect();
        ordered.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));

        observer.set_total_work_units(100);
        observer.done_work(0);

        let mut series_list: Vec<DicomSeries> = Vec::new();
        let mut previous_instances = HashSet::new();

        for (index, path) in ordered.iter().enumerate() {
            if observer.cancel_requested() {
                debug!("file split canceled");
                break;
            }
            observer.done_work(percent(index + 1, ordered.len()));

            let file = match DicomFile::open(path) {
                Ok(file) => file,
                Err(e) => {
                    self.logger
                        .warning(format!("Unable to read {}: {e}", path.display()));
                    continue;
                }
            };

            if file.is_dicomdir() {
                continue;
            }

            let sop_instance_uid = file.sop_instance_uid().unwrap_or_default();
            if !previous_instances.insert(sop_instance_uid.clone()) {
                self.logger.warning(format!(
                    "The instance {sop_instance_uid} has already been read, which usually means DICOM files are corrupted."
                ));
                continue;
            }

            let series_uid = file.string(tag::SERIES_INSTANCE_UID).unwrap_or_default();
            let position = series_list
                .iter()
                .position(|series| series.instance_uid == series_uid);
            let series = match position {
                Some(position) => &mut series_list[position],
                None => {
                    let mut series = DicomSeries::new(series_uid);
                    series.read_series_attributes(file.data_set());
                    series_list.push(series);
                    let last = series_list.len() - 1;
                    &mut series_list[last]
                }
            };

            series.add_instance(DicomInstance {
                path: (*path).clone(),
                sop_class_uid: file.sop_class_uid().unwrap_or_default(),
                sop_instance_uid,
                instance_number: file.data_set().integer(tag::INSTANCE_NUMBER),
            });
        }

        debug!(series = series_list.len(), files = files.len(), "files split");
        Ok(series_list)
    }

    /// Complete series found through a DICOMDIR.
    ///
    /// The series attributes and SOP class are read from the first instance,
    /// then [`fill_series`](SeriesScanner::fill_series) runs. Series whose
    /// first instance cannot be read are logged as critical and removed.
    pub fn complete(&mut self, series_list: &mut Vec<DicomSeries>, observer: &Observer) {
        series_list.retain_mut(|series| {
            let Some(file) = self.open_first_instance(series) else {
                return false;
            };
            series.read_series_attributes(file.data_set());
            if let Some(uid) = file.sop_class_uid().filter(|uid| !uid.is_empty()) {
                series.sop_class_uids.insert(uid);
            }
            true
        });
        self.fill_series(series_list, observer);
    }

    /// Read patient, study and equipment from the first instance of each
    /// series.
    ///
    /// Series whose first instance cannot be read are logged as critical and
    /// removed; the others are still filled.
    pub fn fill_series(&mut self, series_list: &mut Vec<DicomSeries>, observer: &Observer) {
        self.patients.clear();
        self.studies.clear();
        self.equipments.clear();

        observer.set_total_work_units(100);
        let total = series_list.len();
        let mut visited = 0;

        series_list.retain_mut(|series| {
            if observer.cancel_requested() {
                return true;
            }
            visited += 1;
            observer.done_work(percent(visited, total));
            series.number_of_instances = series.instances.len();

            let Some(file) = self.open_first_instance(series) else {
                return false;
            };
            series.patient = self.patient(&file);
            series.study = self.study(&file);
            series.equipment = self.equipment(&file);
            true
        });
    }

    /// Open the first instance of `series`, logging a critical entry when
    /// there is none or it cannot be read.
    fn open_first_instance(&self, series: &DicomSeries) -> Option<DicomFile> {
        let Some(first) = series.instances.first() else {
            self.logger.critical(format!(
                "The series {} doesn't contain any instance",
                series.instance_uid
            ));
            return None;
        };
        match DicomFile::open(&first.path) {
            Ok(file) => Some(file),
            Err(e) => {
                self.logger.critical(format!(
                    "The series {} is skipped: {} cannot be read: {e}",
                    series.instance_uid,
                    first.path.display()
                ));
                None
            }
        }
    }

    fn patient(&mut self, file: &DicomFile) -> Patient {
        let data = file.data_set();
        let patient_id = data.string(tag::PATIENT_ID).unwrap_or_default();
        self.patients
            .entry(patient_id.clone())
            .or_insert_with(|| Patient {
                patient_id,
                name: data.string(tag::PATIENT_NAME).unwrap_or_default(),
                birthdate: data.string(tag::PATIENT_BIRTH_DATE).unwrap_or_default(),
                sex: data.string(tag::PATIENT_SEX).unwrap_or_default(),
            })
            .clone()
    }

    fn study(&mut self, file: &DicomFile) -> Study {
        let data = file.data_set();
        let instance_uid = data.string(tag::STUDY_INSTANCE_UID).unwrap_or_default();
        self.studies
            .entry(instance_uid.clone())
            .or_insert_with(|| Study {
                instance_uid,
                date: data.string(tag::STUDY_DATE).unwrap_or_default(),
                time: data.string(tag::STUDY_TIME).unwrap_or_default(),
                referring_physician_name: data
                    .string(tag::REFERRING_PHYSICIAN_NAME)
                    .unwrap_or_default(),
                description: data.string(tag::STUDY_DESCRIPTION).unwrap_or_default(),
                patient_age: data.string(tag::PATIENT_AGE).unwrap_or_default(),
            })
            .clone()
    }

    fn equipment(&mut self, file: &DicomFile) -> Equipment {
        let institution_name = file
            .data_set()
            .string(tag::INSTITUTION_NAME)
            .unwrap_or_default();
        self.equipments
            .entry(institution_name.clone())
            .or_insert_with(|| Equipment { institution_name })
            .clone()
    }
}
