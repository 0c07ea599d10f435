//! Synthetic DICOM writer used by unit tests.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::file::{EXPLICIT_VR_LITTLE_ENDIAN, MAGIC, PREAMBLE_SIZE};
use super::tag::{self, Tag};

const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

pub(crate) const CT_IMAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
pub(crate) const MR_IMAGE: &str = "1.2.840.10008.5.1.4.1.1.4";
pub(crate) const COMPREHENSIVE_3D_SR: &str = "1.2.840.10008.5.1.4.1.1.88.34";

fn is_long(vr: &[u8; 2]) -> bool {
    matches!(vr, b"OB" | b"OW" | b"SQ" | b"UN" | b"UT")
}

fn push_header(out: &mut Vec<u8>, explicit: bool, tag: Tag, vr: &[u8; 2], length: u32) {
    out.extend_from_slice(&tag.group.to_le_bytes());
    out.extend_from_slice(&tag.element.to_le_bytes());
    if !explicit {
        out.extend_from_slice(&length.to_le_bytes());
    } else if is_long(vr) {
        out.extend_from_slice(vr);
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(&length.to_le_bytes());
    } else {
        out.extend_from_slice(vr);
        out.extend_from_slice(&(length as u16).to_le_bytes());
    }
}

/// Builder for an encoded data set.
#[derive(Debug, Clone)]
pub(crate) struct DataSetWriter {
    explicit: bool,
    elements: BTreeMap<Tag, Vec<u8>>,
}

impl DataSetWriter {
    pub(crate) fn explicit() -> Self {
        Self {
            explicit: true,
            elements: BTreeMap::new(),
        }
    }

    pub(crate) fn implicit() -> Self {
        Self {
            explicit: false,
            elements: BTreeMap::new(),
        }
    }

    pub(crate) fn raw(mut self, tag: Tag, vr: &[u8; 2], value: &[u8]) -> Self {
        let mut out = Vec::new();
        push_header(&mut out, self.explicit, tag, vr, value.len() as u32);
        out.extend_from_slice(value);
        self.elements.insert(tag, out);
        self
    }

    pub(crate) fn string(self, tag: Tag, vr: &[u8; 2], value: &str) -> Self {
        let mut bytes = value.as_bytes().to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(if vr == b"UI" { 0 } else { b' ' });
        }
        self.raw(tag, vr, &bytes)
    }

    pub(crate) fn sequence(mut self, tag: Tag, items: &[DataSetWriter], undefined: bool) -> Self {
        let mut body = Vec::new();
        for item in items {
            let encoded = item.encode();
            body.extend_from_slice(&tag::ITEM.group.to_le_bytes());
            body.extend_from_slice(&tag::ITEM.element.to_le_bytes());
            if undefined {
                body.extend_from_slice(&UNDEFINED_LENGTH.to_le_bytes());
                body.extend_from_slice(&encoded);
                body.extend_from_slice(&tag::ITEM_DELIMITATION.group.to_le_bytes());
                body.extend_from_slice(&tag::ITEM_DELIMITATION.element.to_le_bytes());
                body.extend_from_slice(&0u32.to_le_bytes());
            } else {
                body.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
                body.extend_from_slice(&encoded);
            }
        }

        let mut out = Vec::new();
        if undefined {
            push_header(&mut out, self.explicit, tag, b"SQ", UNDEFINED_LENGTH);
            out.extend_from_slice(&body);
            out.extend_from_slice(&tag::SEQUENCE_DELIMITATION.group.to_le_bytes());
            out.extend_from_slice(&tag::SEQUENCE_DELIMITATION.element.to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
        } else {
            push_header(&mut out, self.explicit, tag, b"SQ", body.len() as u32);
            out.extend_from_slice(&body);
        }
        self.elements.insert(tag, out);
        self
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        self.elements.values().flatten().copied().collect()
    }
}

/// Encode a Part 10 file: preamble, meta group, then `body`.
pub(crate) fn file_bytes(
    transfer_syntax: &str,
    sop_class: &str,
    sop_instance: &str,
    body: &DataSetWriter,
) -> Vec<u8> {
    let meta = DataSetWriter::explicit()
        .raw(Tag::new(0x0002, 0x0001), b"OB", &[0, 1])
        .string(tag::MEDIA_STORAGE_SOP_CLASS_UID, b"UI", sop_class)
        .string(tag::MEDIA_STORAGE_SOP_INSTANCE_UID, b"UI", sop_instance)
        .string(tag::TRANSFER_SYNTAX_UID, b"UI", transfer_syntax)
        .encode();

    let mut out = vec![0u8; PREAMBLE_SIZE];
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&meta);
    out.extend_from_slice(&body.encode());
    out
}

/// Attributes of one synthetic image instance.
#[derive(Debug, Clone)]
pub(crate) struct InstanceSpec<'a> {
    pub series_uid: &'a str,
    pub sop_class: &'a str,
    pub sop_instance: &'a str,
    pub instance_number: u32,
    pub patient_id: &'a str,
    pub study_uid: &'a str,
}

impl<'a> InstanceSpec<'a> {
    pub(crate) fn new(series_uid: &'a str, sop_class: &'a str, sop_instance: &'a str) -> Self {
        Self {
            series_uid,
            sop_class,
            sop_instance,
            instance_number: 1,
            patient_id: "PAT-1",
            study_uid: "1.2.3.100",
        }
    }

    pub(crate) fn number(mut self, instance_number: u32) -> Self {
        self.instance_number = instance_number;
        self
    }

    pub(crate) fn body(&self) -> DataSetWriter {
        DataSetWriter::explicit()
            .string(tag::SOP_CLASS_UID, b"UI", self.sop_class)
            .string(tag::SOP_INSTANCE_UID, b"UI", self.sop_instance)
            .string(tag::STUDY_DATE, b"DA", "20240102")
            .string(tag::SERIES_DATE, b"DA", "20240102")
            .string(tag::MODALITY, b"CS", "CT")
            .string(tag::INSTITUTION_NAME, b"LO", "IRCAD")
            .string(tag::SERIES_DESCRIPTION, b"LO", "Abdomen")
            .string(tag::PERFORMING_PHYSICIAN_NAME, b"PN", "Doe^John\\Roe^Jane")
            .string(tag::PATIENT_NAME, b"PN", "Test^Patient")
            .string(tag::PATIENT_ID, b"LO", self.patient_id)
            .string(tag::PATIENT_SEX, b"CS", "O")
            .string(tag::STUDY_INSTANCE_UID, b"UI", self.study_uid)
            .string(tag::SERIES_INSTANCE_UID, b"UI", self.series_uid)
            .string(
                tag::INSTANCE_NUMBER,
                b"IS",
                &self.instance_number.to_string(),
            )
            .raw(tag::PIXEL_DATA, b"OW", &[0u8; 16])
    }

    pub(crate) fn bytes(&self) -> Vec<u8> {
        file_bytes(
            EXPLICIT_VR_LITTLE_ENDIAN,
            self.sop_class,
            self.sop_instance,
            &self.body(),
        )
    }

    pub(crate) fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.bytes()).unwrap();
        path
    }
}
