//! Test utilities for integration tests.
//!
//! This module provides builders for synthetic DICOM Part 10 files and
//! DICOMDIR indexes, written into temporary folders.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sight_core::dicom::file::{EXPLICIT_VR_LITTLE_ENDIAN, MAGIC, PREAMBLE_SIZE};
use sight_core::dicom::sop_class::MEDIA_STORAGE_DIRECTORY;
use sight_core::dicom::tag::{self, Tag};

pub const CT_IMAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
pub const MR_IMAGE: &str = "1.2.840.10008.5.1.4.1.1.4";
pub const COMPREHENSIVE_3D_SR: &str = "1.2.840.10008.5.1.4.1.1.88.34";

// =============================================================================
// Data Set Builder
// =============================================================================

/// Builder for an explicit VR little endian data set.
///
/// Elements are kept in tag order; sequences use defined lengths.
#[derive(Clone, Default)]
pub struct DataSetBuilder {
    elements: BTreeMap<Tag, Vec<u8>>,
}

impl DataSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(mut self, tag: Tag, vr: &[u8; 2], value: &[u8]) -> Self {
        let mut data = Vec::new();
        write_tag(&mut data, tag);
        data.extend_from_slice(vr);
        if matches!(vr, b"OB" | b"OW" | b"SQ" | b"UN" | b"UT") {
            data.extend_from_slice(&[0, 0]);
            data.extend_from_slice(&(value.len() as u32).to_le_bytes());
        } else {
            data.extend_from_slice(&(value.len() as u16).to_le_bytes());
        }
        data.extend_from_slice(value);
        self.elements.insert(tag, data);
        self
    }

    /// Add a text element, padded to an even length.
    pub fn text(self, tag: Tag, vr: &[u8; 2], value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(if vr == b"UI" { 0 } else { b' ' });
        }
        self.raw(tag, vr, &bytes)
    }

    pub fn sequence(self, tag: Tag, items: &[DataSetBuilder]) -> Self {
        let mut body = Vec::new();
        for item in items {
            let encoded = item.build();
            write_tag(&mut body, tag::ITEM);
            body.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
            body.extend(encoded);
        }
        self.raw(tag, b"SQ", &body)
    }

    pub fn build(&self) -> Vec<u8> {
        self.elements.values().flatten().copied().collect()
    }
}

fn write_tag(data: &mut Vec<u8>, tag: Tag) {
    data.extend_from_slice(&tag.group.to_le_bytes());
    data.extend_from_slice(&tag.element.to_le_bytes());
}

/// Encode a Part 10 file with an explicit VR little endian body.
pub fn part10(sop_class: &str, sop_instance: &str, body: &DataSetBuilder) -> Vec<u8> {
    let meta = DataSetBuilder::new()
        .raw(Tag::new(0x0002, 0x0001), b"OB", &[0, 1])
        .text(tag::MEDIA_STORAGE_SOP_CLASS_UID, b"UI", sop_class)
        .text(tag::MEDIA_STORAGE_SOP_INSTANCE_UID, b"UI", sop_instance)
        .text(tag::TRANSFER_SYNTAX_UID, b"UI", EXPLICIT_VR_LITTLE_ENDIAN)
        .build();

    let mut data = vec![0u8; PREAMBLE_SIZE];
    data.extend_from_slice(MAGIC);
    data.extend(meta);
    data.extend(body.build());
    data
}

// =============================================================================
// Instances
// =============================================================================

/// One synthetic image instance.
#[derive(Clone)]
pub struct TestInstance {
    pub series_uid: String,
    pub sop_class: String,
    pub sop_instance: String,
    pub instance_number: Option<u32>,
    pub modality: String,
}

impl TestInstance {
    pub fn new(series_uid: &str, sop_class: &str, sop_instance: &str) -> Self {
        Self {
            series_uid: series_uid.to_string(),
            sop_class: sop_class.to_string(),
            sop_instance: sop_instance.to_string(),
            instance_number: Some(1),
            modality: "CT".to_string(),
        }
    }

    pub fn with_number(mut self, number: Option<u32>) -> Self {
        self.instance_number = number;
        self
    }

    pub fn with_modality(mut self, modality: &str) -> Self {
        self.modality = modality.to_string();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut body = DataSetBuilder::new()
            .text(tag::SOP_CLASS_UID, b"UI", &self.sop_class)
            .text(tag::SOP_INSTANCE_UID, b"UI", &self.sop_instance)
            .text(tag::STUDY_DATE, b"DA", "20230615")
            .text(tag::MODALITY, b"CS", &self.modality)
            .text(tag::INSTITUTION_NAME, b"LO", "Hospital")
            .text(tag::SERIES_DESCRIPTION, b"LO", "Series")
            .text(tag::PATIENT_NAME, b"PN", "Doe^Jane")
            .text(tag::PATIENT_ID, b"LO", "P-42")
            .text(tag::STUDY_INSTANCE_UID, b"UI", "1.2.826.0.1.1")
            .text(tag::SERIES_INSTANCE_UID, b"UI", &self.series_uid)
            .raw(tag::PIXEL_DATA, b"OW", &[0u8; 8]);
        if let Some(number) = self.instance_number {
            body = body.text(tag::INSTANCE_NUMBER, b"IS", &number.to_string());
        }
        part10(&self.sop_class, &self.sop_instance, &body)
    }

    /// Write the instance to `dir/name`, creating parent folders.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

// =============================================================================
// DICOMDIR
// =============================================================================

/// Builder for a DICOMDIR listing series and their image files.
#[derive(Default)]
pub struct DicomdirBuilder {
    records: Vec<DataSetBuilder>,
}

impl DicomdirBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn series(mut self, series_uid: &str) -> Self {
        self.records.push(
            DataSetBuilder::new()
                .text(tag::DIRECTORY_RECORD_TYPE, b"CS", "SERIES")
                .text(tag::SERIES_INSTANCE_UID, b"UI", series_uid),
        );
        self
    }

    /// `file_id` components are separated by `\`.
    pub fn image(mut self, file_id: &str, sop_class: &str, sop_instance: &str) -> Self {
        self.records.push(
            DataSetBuilder::new()
                .text(tag::DIRECTORY_RECORD_TYPE, b"CS", "IMAGE")
                .text(tag::REFERENCED_FILE_ID, b"CS", file_id)
                .text(tag::REFERENCED_SOP_CLASS_UID_IN_FILE, b"UI", sop_class)
                .text(tag::REFERENCED_SOP_INSTANCE_UID_IN_FILE, b"UI", sop_instance),
        );
        self
    }

    pub fn write(&self, dir: &Path) -> PathBuf {
        let body = DataSetBuilder::new().sequence(tag::DIRECTORY_RECORD_SEQUENCE, &self.records);
        let path = dir.join("DICOMDIR");
        std::fs::write(&path, part10(MEDIA_STORAGE_DIRECTORY, "1.2.826.0.1.9", &body)).unwrap();
        path
    }
}
