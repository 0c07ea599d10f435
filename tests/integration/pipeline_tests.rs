//! Series set reader integration tests.
//!
//! Tests verify:
//! - Folders are read into one series per SeriesInstanceUID
//! - Mixed SOP class series fail unless split
//! - DICOMDIR lookup and its fallback to file search
//! - Report-like series are converted last

use std::sync::Arc;

use sight_core::data::{Object, Series, SeriesSet};
use sight_core::dicom::filter::SOP_CLASS_UID_SPLITTER;
use sight_core::dicom::{ReaderOptions, SeriesSetReader};
use sight_core::jobs::{JobLike, JobState};
use sight_core::logger::LogLevel;

use super::test_utils::{DicomdirBuilder, TestInstance, COMPREHENSIVE_3D_SR, CT_IMAGE, MR_IMAGE};

fn series_of(set: &Arc<Object>) -> Vec<Series> {
    let objects: Vec<Arc<Object>> = set
        .read::<SeriesSet, _>(|set| set.iter().cloned().collect())
        .unwrap();
    objects
        .iter()
        .map(|object| object.read::<Series, _>(Series::clone).unwrap())
        .collect()
}

// =============================================================================
// Folder Reading
// =============================================================================

#[test]
fn test_read_nested_folder() {
    let dir = tempfile::tempdir().unwrap();
    for n in 1..=3 {
        TestInstance::new("1.2.3.1", CT_IMAGE, &format!("1.2.3.1.{n}"))
            .with_number(Some(n))
            .write(dir.path(), &format!("ct/IM{n}"));
    }
    TestInstance::new("1.2.3.2", MR_IMAGE, "1.2.3.2.1")
        .with_modality("MR")
        .write(dir.path(), "mr/deep/IM1");
    std::fs::write(dir.path().join("notes.txt"), "not dicom").unwrap();

    let reader = SeriesSetReader::new(dir.path(), ReaderOptions::default());
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert_eq!(report.converted, 2);
    assert!(!report.from_dicomdir);
    assert!(!report.canceled);

    let series = series_of(&set);
    let ct = series.iter().find(|s| s.instance_uid == "1.2.3.1").unwrap();
    assert_eq!(ct.modality, "CT");
    assert_eq!(ct.number_of_instances, 3);
    assert_eq!(ct.sop_class_uid, CT_IMAGE);
    assert_eq!(ct.patient.patient_id, "P-42");
    assert_eq!(ct.equipment.institution_name, "Hospital");

    let mr = series.iter().find(|s| s.instance_uid == "1.2.3.2").unwrap();
    assert_eq!(mr.modality, "MR");

    for job in reader.aggregator().children() {
        assert!(job.state().is_terminal(), "{} not finished", job.name());
    }
}

#[test]
fn test_missing_folder_fails() {
    let dir = tempfile::tempdir().unwrap();
    let reader = SeriesSetReader::new(dir.path().join("absent"), ReaderOptions::default());
    let set = Object::new(SeriesSet::new());

    assert!(reader.read(&set).is_err());
    assert!(reader.logger().has_critical());
    assert_eq!(series_of(&set).len(), 0);
}

#[test]
fn test_sop_class_allow_list() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "a");
    TestInstance::new("1.2.3.2", MR_IMAGE, "1.2.3.2.1").write(dir.path(), "b");

    let options = ReaderOptions {
        sop_classes: vec![MR_IMAGE.to_string()],
        ..ReaderOptions::default()
    };
    let reader = SeriesSetReader::new(dir.path(), options);
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert_eq!(report.converted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(series_of(&set)[0].instance_uid, "1.2.3.2");
    assert_eq!(reader.logger().count(LogLevel::Information), 1);
}

// =============================================================================
// SOP Class Homogeneity
// =============================================================================

#[test]
fn test_mixed_sop_classes_are_not_converted() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "a");
    TestInstance::new("1.2.3.1", MR_IMAGE, "1.2.3.1.2").write(dir.path(), "b");
    TestInstance::new("1.2.3.9", CT_IMAGE, "1.2.3.9.1").write(dir.path(), "c");

    let reader = SeriesSetReader::new(dir.path(), ReaderOptions::default());
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert_eq!(report.converted, 1);
    assert_eq!(report.failed, vec!["1.2.3.1".to_string()]);
    assert_eq!(series_of(&set)[0].instance_uid, "1.2.3.9");
    assert_eq!(reader.logger().count(LogLevel::Critical), 1);
}

#[test]
fn test_splitter_makes_mixed_series_convertible() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "a");
    TestInstance::new("1.2.3.1", MR_IMAGE, "1.2.3.1.2").write(dir.path(), "b");

    let options = ReaderOptions {
        filter: Some(SOP_CLASS_UID_SPLITTER.to_string()),
        ..ReaderOptions::default()
    };
    let reader = SeriesSetReader::new(dir.path(), options);
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert_eq!(report.converted, 2);
    assert!(report.failed.is_empty());
    let mut classes: Vec<String> = series_of(&set).into_iter().map(|s| s.sop_class_uid).collect();
    classes.sort();
    assert_eq!(classes, vec![CT_IMAGE.to_string(), MR_IMAGE.to_string()]);
}

// =============================================================================
// DICOMDIR
// =============================================================================

#[test]
fn test_dicomdir_lists_series() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "DATA/IM1");
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.2").write(dir.path(), "DATA/IM2");
    // Not indexed, so not read.
    TestInstance::new("1.2.3.7", CT_IMAGE, "1.2.3.7.1").write(dir.path(), "DATA/IM3");
    DicomdirBuilder::new()
        .series("1.2.3.1")
        .image("DATA\\IM1", CT_IMAGE, "1.2.3.1.1")
        .image("DATA\\IM2", CT_IMAGE, "1.2.3.1.2")
        .write(dir.path());

    let options = ReaderOptions {
        dicomdir: true,
        ..ReaderOptions::default()
    };
    let reader = SeriesSetReader::new(dir.path(), options);
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert!(report.from_dicomdir);
    assert_eq!(report.converted, 1);
    let series = series_of(&set);
    assert_eq!(series[0].number_of_instances, 2);
    assert_eq!(series[0].modality, "CT");
    assert_eq!(reader.search_job().done_work_units(), 0);
}

#[test]
fn test_dicomdir_disabled_goes_to_file_search() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "DATA/IM1");
    TestInstance::new("1.2.3.7", CT_IMAGE, "1.2.3.7.1").write(dir.path(), "DATA/IM3");
    DicomdirBuilder::new()
        .series("1.2.3.1")
        .image("DATA\\IM1", CT_IMAGE, "1.2.3.1.1")
        .write(dir.path());

    let reader = SeriesSetReader::new(dir.path(), ReaderOptions::default());
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert!(!report.from_dicomdir);
    assert_eq!(report.converted, 2);
    assert_eq!(reader.dicomdir_job().state(), JobState::Finished);
    assert_eq!(reader.dicomdir_job().done_work_units(), 0);
}

#[test]
fn test_empty_dicomdir_falls_back_to_file_search() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "IM1");
    DicomdirBuilder::new().write(dir.path());

    let options = ReaderOptions {
        dicomdir: true,
        ..ReaderOptions::default()
    };
    let reader = SeriesSetReader::new(dir.path(), options);
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert!(!report.from_dicomdir);
    assert_eq!(report.converted, 1);
}

#[test]
fn test_unreadable_dicomdir_falls_back_to_file_search() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "a.dcm");
    std::fs::write(dir.path().join("DICOMDIR"), b"garbage, not a media directory").unwrap();

    let options = ReaderOptions {
        dicomdir: true,
        ..ReaderOptions::default()
    };
    let reader = SeriesSetReader::new(dir.path(), options);
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert!(!report.from_dicomdir);
    assert_eq!(report.converted, 1);
    assert_eq!(series_of(&set)[0].instance_uid, "1.2.3.1");
    assert_eq!(reader.logger().count(LogLevel::Warning), 1);
}

#[test]
fn test_dicomdir_series_with_corrupt_instance_is_dropped() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "DATA/IM1");
    std::fs::write(dir.path().join("DATA").join("IM2"), b"corrupt").unwrap();
    DicomdirBuilder::new()
        .series("1.2.3.9")
        .image("DATA\\IM2", CT_IMAGE, "1.2.3.9.1")
        .series("1.2.3.1")
        .image("DATA\\IM1", CT_IMAGE, "1.2.3.1.1")
        .write(dir.path());

    let options = ReaderOptions {
        dicomdir: true,
        ..ReaderOptions::default()
    };
    let reader = SeriesSetReader::new(dir.path(), options);
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert!(report.from_dicomdir);
    assert_eq!(report.converted, 1);
    assert_eq!(series_of(&set)[0].instance_uid, "1.2.3.1");
    assert_eq!(reader.logger().count(LogLevel::Critical), 1);
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_report_series_are_converted_last() {
    let dir = tempfile::tempdir().unwrap();
    // The report file sorts first by name.
    TestInstance::new("1.2.3.5", COMPREHENSIVE_3D_SR, "1.2.3.5.1")
        .with_modality("SR")
        .write(dir.path(), "a_report");
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "b_image");
    TestInstance::new("1.2.3.2", MR_IMAGE, "1.2.3.2.1").write(dir.path(), "c_image");

    let reader = SeriesSetReader::new(dir.path(), ReaderOptions::default());
    let set = Object::new(SeriesSet::new());
    reader.read(&set).unwrap();

    let uids: Vec<String> = series_of(&set).into_iter().map(|s| s.instance_uid).collect();
    assert_eq!(uids, vec!["1.2.3.1", "1.2.3.2", "1.2.3.5"]);
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_canceled_read_converts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    TestInstance::new("1.2.3.1", CT_IMAGE, "1.2.3.1.1").write(dir.path(), "IM1");

    let reader = SeriesSetReader::new(dir.path(), ReaderOptions::default());
    reader.cancel();
    let set = Object::new(SeriesSet::new());
    let report = reader.read(&set).unwrap();

    assert!(report.canceled);
    assert_eq!(report.converted, 0);
    assert!(series_of(&set).is_empty());
}
