//! Series set reader pipeline.
//!
//! ```text
//!   DICOMDIR lookup ──(no series)──► file search ──► file split
//!         │                                              │
//!         └──(series)──► completion ◄────────────────────┘
//!                            │
//!                            ▼
//!                     filter (optional) ──► conversion ──► SeriesSet
//! ```
//!
//! Each phase reports through its own [`Observer`]; all observers belong to
//! one [`Aggregator`] created with the reader, before the pipeline starts.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::dicomdir::read_dicomdir;
use super::filter;
use super::scanner::SeriesScanner;
use super::search::search_recursively;
use super::series::DicomSeries;
use super::sop_class;
use crate::data::{Object, SeriesSet};
use crate::error::DicomError;
use crate::jobs::{Aggregator, JobLike, Observer};
use crate::logger::{LogEntry, Logger};

// =============================================================================
// Options and report
// =============================================================================

/// Reader settings.
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// Look for a DICOMDIR before searching the folder
    pub dicomdir: bool,
    /// Filter applied before conversion, by name
    pub filter: Option<String>,
    /// SOP classes to convert; empty accepts every class
    pub sop_classes: Vec<String>,
}

/// Outcome of a read.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReadReport {
    /// Series added to the set
    pub converted: usize,
    /// Series skipped by the SOP class allow-list
    pub skipped: usize,
    /// Instance UIDs of the series that failed to convert
    pub failed: Vec<String>,
    /// Whether the DICOMDIR provided the series
    pub from_dicomdir: bool,
    pub canceled: bool,
    pub entries: Vec<LogEntry>,
}

/// Order report-like series after the other series.
///
/// Used with a stable sort, series of the same group keep their order.
pub fn dicom_series_comparator(a: &DicomSeries, b: &DicomSeries) -> Ordering {
    let is_report = |series: &DicomSeries| {
        series
            .first_sop_class_uid()
            .is_some_and(sop_class::is_report_like)
    };
    is_report(a).cmp(&is_report(b))
}

// =============================================================================
// SeriesSetReader
// =============================================================================

/// Reads the DICOM series of a folder into a series set.
pub struct SeriesSetReader {
    folder: PathBuf,
    options: ReaderOptions,
    logger: Logger,
    aggregator: Arc<Aggregator>,
    dicomdir_job: Arc<Observer>,
    search_job: Arc<Observer>,
    read_job: Arc<Observer>,
    complete_job: Arc<Observer>,
    filter_job: Arc<Observer>,
    convert_job: Arc<Observer>,
}

impl SeriesSetReader {
    /// Create a reader and its jobs.
    pub fn new(folder: impl Into<PathBuf>, options: ReaderOptions) -> Self {
        let aggregator = Aggregator::new("DICOM series set reader");
        let dicomdir_job = Observer::new("Extracting information from DICOMDIR");
        let search_job = Observer::new("Searching DICOM files");
        let read_job = Observer::new("Reading DICOM files");
        let complete_job = Observer::new("Completing series");
        let filter_job = Observer::new("Applying filter");
        let convert_job = Observer::new("Converting series");

        for job in [
            &dicomdir_job,
            &search_job,
            &read_job,
            &complete_job,
            &filter_job,
            &convert_job,
        ] {
            aggregator.add(Arc::clone(job) as Arc<dyn JobLike>);
        }

        Self {
            folder: folder.into(),
            options,
            logger: Logger::new(),
            aggregator,
            dicomdir_job,
            search_job,
            read_job,
            complete_job,
            filter_job,
            convert_job,
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Job grouping every phase.
    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn dicomdir_job(&self) -> &Arc<Observer> {
        &self.dicomdir_job
    }

    pub fn search_job(&self) -> &Arc<Observer> {
        &self.search_job
    }

    pub fn read_job(&self) -> &Arc<Observer> {
        &self.read_job
    }

    pub fn complete_job(&self) -> &Arc<Observer> {
        &self.complete_job
    }

    pub fn filter_job(&self) -> &Arc<Observer> {
        &self.filter_job
    }

    pub fn convert_job(&self) -> &Arc<Observer> {
        &self.convert_job
    }

    /// Request cancellation of every phase.
    pub fn cancel(&self) {
        self.aggregator.cancel();
    }

    fn jobs(&self) -> [&Arc<Observer>; 6] {
        [
            &self.dicomdir_job,
            &self.search_job,
            &self.read_job,
            &self.complete_job,
            &self.filter_job,
            &self.convert_job,
        ]
    }

    /// Run the pipeline and append the converted series to `series_set`.
    ///
    /// Every job is finished when this returns, whatever the outcome.
    ///
    /// # Errors
    /// An error escaping a phase; it is also logged as critical.
    pub fn read(&self, series_set: &Arc<Object>) -> Result<ReadReport, DicomError> {
        debug!(folder = %self.folder.display(), options = ?self.options, "DICOM read started");
        let future = self.aggregator.run();

        let outcome = self.run_pipeline(series_set);
        if let Err(e) = &outcome {
            self.logger.critical(format!("DICOM read failed: {e}"));
        }

        for job in self.jobs() {
            job.finish();
        }
        future.get()?;

        let mut report = outcome?;
        report.canceled = self.aggregator.cancel_requested();
        report.entries = self.logger.entries();
        info!(
            converted = report.converted,
            skipped = report.skipped,
            failed = report.failed.len(),
            "DICOM read complete"
        );
        Ok(report)
    }

    fn canceled(&self) -> bool {
        self.aggregator.cancel_requested()
    }

    fn run_pipeline(&self, series_set: &Arc<Object>) -> Result<ReadReport, DicomError> {
        if !self.folder.is_dir() {
            return Err(DicomError::FolderNotFound(self.folder.clone()));
        }

        let mut scanner = SeriesScanner::new(self.logger.clone());
        let mut report = ReadReport::default();

        // DICOMDIR lookup
        let mut dicom_series = Vec::new();
        if self.options.dicomdir {
            dicom_series = read_dicomdir(&self.folder, &self.dicomdir_job, &self.logger);
            if !dicom_series.is_empty() {
                self.dicomdir_job.done();
                scanner.complete(&mut dicom_series, &self.complete_job);
                report.from_dicomdir = !dicom_series.is_empty();
            }
            if dicom_series.is_empty() {
                debug!("DICOMDIR gave no series, falling back to file search");
            }
        }
        self.dicomdir_job.finish();

        // File search and split
        if dicom_series.is_empty() {
            let files = search_recursively(&self.folder, &self.search_job, &self.logger)?;
            self.search_job.done();
            self.search_job.finish();
            if self.canceled() {
                return Ok(report);
            }

            dicom_series = scanner.split_files(&files, &self.read_job)?;
            self.read_job.done();
            self.read_job.finish();
            if self.canceled() {
                return Ok(report);
            }

            scanner.fill_series(&mut dicom_series, &self.complete_job);
        }
        self.search_job.finish();
        self.read_job.finish();
        self.complete_job.done();
        self.complete_job.finish();
        if self.canceled() {
            return Ok(report);
        }

        // Filter
        if let Some(name) = &self.options.filter {
            let filter = filter::create(name)?;
            self.filter_job.set_total_work_units(1);
            dicom_series = filter::apply_filter(dicom_series, filter.as_ref(), true, &self.logger)?;
            self.filter_job.done();
        }
        self.filter_job.finish();

        self.convert_dicom_series(dicom_series, series_set, &mut report)?;
        Ok(report)
    }

    /// Convert series into `series_set`, report-like series last.
    ///
    /// Per-series failures are logged as critical and the conversion goes
    /// on with the next series.
    pub fn convert_dicom_series(
        &self,
        mut dicom_series: Vec<DicomSeries>,
        series_set: &Arc<Object>,
        report: &mut ReadReport,
    ) -> Result<(), DicomError> {
        dicom_series.sort_by(dicom_series_comparator);
        self.convert_job
            .set_total_work_units(dicom_series.len() as u64);

        for (index, series) in dicom_series.iter().enumerate() {
            if self.canceled() {
                break;
            }

            match self.convert_one(series) {
                Ok(Some(object)) => {
                    series_set.write::<SeriesSet, _>(|set| set.push(object))?;
                    report.converted += 1;
                }
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    self.logger.critical(e.to_string());
                    report.failed.push(series.instance_uid.clone());
                }
            }
            self.convert_job.done_work(index as u64 + 1);
        }
        self.convert_job.finish();

        if report.converted > 0 {
            series_set.notify_modified();
        }
        Ok(())
    }

    fn convert_one(&self, series: &DicomSeries) -> Result<Option<Arc<Object>>, DicomError> {
        if series.sop_class_uids.len() > 1 {
            return Err(DicomError::SeveralSopClassUids {
                series: series.instance_uid.clone(),
                uids: series.sop_class_uids.iter().cloned().collect(),
            });
        }
        if series.is_empty() {
            return Err(DicomError::EmptySeries(series.instance_uid.clone()));
        }

        let sop_class_uid = series.first_sop_class_uid().unwrap_or_default();
        if !self.options.sop_classes.is_empty()
            && !self.options.sop_classes.iter().any(|uid| uid == sop_class_uid)
        {
            self.logger.information(format!(
                "The series {} has been skipped: {} is not a supported SOP class",
                series.instance_uid,
                sop_class::name(sop_class_uid)
            ));
            return Ok(None);
        }
        if sop_class::is_hazardous(sop_class_uid) {
            self.logger.warning(format!(
                "The series {} uses the SOP class {} whose content may not be read correctly",
                series.instance_uid,
                sop_class::name(sop_class_uid)
            ));
        }

        Ok(Some(Object::new(series.to_series())))
    }
}

impl std::fmt::Debug for SeriesSetReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeriesSetReader")
            .field("folder", &self.folder)
            .field("options", &self.options)
            .finish()
    }
}
