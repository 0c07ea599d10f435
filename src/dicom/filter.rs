//! Series filters applied between the scan and the conversion.

use std::collections::BTreeMap;

use tracing::debug;

use super::series::DicomSeries;
use crate::error::DicomError;
use crate::logger::Logger;

pub const SOP_CLASS_UID_SPLITTER: &str = "sop_class_uid_splitter";
pub const INSTANCE_NUMBER_SORTER: &str = "instance_number_sorter";

/// Names accepted by [`create`].
pub const FILTERS: &[&str] = &[SOP_CLASS_UID_SPLITTER, INSTANCE_NUMBER_SORTER];

/// Transformation of one series into zero or more series.
pub trait DicomFilter: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, series: DicomSeries, logger: &Logger) -> Result<Vec<DicomSeries>, DicomError>;
}

/// Split a series into one series per SOP class.
#[derive(Debug, Default)]
pub struct SopClassUidSplitter;

impl DicomFilter for SopClassUidSplitter {
    fn name(&self) -> &'static str {
        SOP_CLASS_UID_SPLITTER
    }

    fn apply(&self, series: DicomSeries, logger: &Logger) -> Result<Vec<DicomSeries>, DicomError> {
        if series.sop_class_uids.len() <= 1 {
            return Ok(vec![series]);
        }

        let mut groups: BTreeMap<String, DicomSeries> = BTreeMap::new();
        for instance in &series.instances {
            groups
                .entry(instance.sop_class_uid.clone())
                .or_insert_with(|| series.empty_copy())
                .add_instance(instance.clone());
        }

        logger.information(format!(
            "The series {} has been split into {} series by SOP class",
            series.instance_uid,
            groups.len()
        ));
        Ok(groups.into_values().collect())
    }
}

/// Order instances by InstanceNumber (0020,0013).
#[derive(Debug, Default)]
pub struct InstanceNumberSorter;

impl DicomFilter for InstanceNumberSorter {
    fn name(&self) -> &'static str {
        INSTANCE_NUMBER_SORTER
    }

    fn apply(&self, mut series: DicomSeries, _logger: &Logger) -> Result<Vec<DicomSeries>, DicomError> {
        if let Some(missing) = series.instances.iter().find(|i| i.instance_number.is_none()) {
            return Err(DicomError::FilterFailed {
                filter: self.name().to_string(),
                message: format!(
                    "instance {} of series {} has no instance number",
                    missing.sop_instance_uid, series.instance_uid
                ),
            });
        }
        series.instances.sort_by_key(|i| i.instance_number);
        Ok(vec![series])
    }
}

/// Build a filter from its name.
pub fn create(name: &str) -> Result<Box<dyn DicomFilter>, DicomError> {
    match name {
        SOP_CLASS_UID_SPLITTER => Ok(Box::new(SopClassUidSplitter)),
        INSTANCE_NUMBER_SORTER => Ok(Box::new(InstanceNumberSorter)),
        other => Err(DicomError::UnknownFilter(other.to_string())),
    }
}

/// Apply `filter` to every series.
///
/// With `forced`, a series the filter fails on is kept unchanged and the
/// failure logged as a warning; otherwise the first failure is returned.
pub fn apply_filter(
    series_list: Vec<DicomSeries>,
    filter: &dyn DicomFilter,
    forced: bool,
    logger: &Logger,
) -> Result<Vec<DicomSeries>, DicomError> {
    let mut result = Vec::with_capacity(series_list.len());
    for series in series_list {
        match filter.apply(series.clone(), logger) {
            Ok(filtered) => result.extend(filtered),
            Err(e) if forced => {
                logger.warning(format!(
                    "{e}. The filter has been ignored for the series {}",
                    series.instance_uid
                ));
                result.push(series);
            }
            Err(e) => return Err(e),
        }
    }
    debug!(filter = filter.name(), series = result.len(), "filter applied");
    Ok(result)
}
