//! DICOM file parsing.
//!
//! Only the attributes the reader needs are decoded; the scan stops at
//! pixel data.
//!
//! # Part 10 layout
//! ```text
//! Bytes 0-127:   Preamble (ignored)
//! Bytes 128-131: "DICM"
//! Group 0002:    File meta information, always explicit VR little endian
//! Remainder:     Data set, encoded as named by TransferSyntaxUID (0002,0010)
//! ```
//!
//! # Element headers
//! ```text
//! Implicit VR:            tag(4) length(4)
//! Explicit VR, short:     tag(4) VR(2) length(2)
//! Explicit VR, long:      tag(4) VR(2) reserved(2) length(4)   (OB, OW, SQ, UN, UT, ...)
//! Item / delimiters:      tag(4) length(4)                      (group FFFE)
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, trace};

use super::sop_class::MEDIA_STORAGE_DIRECTORY;
use super::tag::{self, Tag};
use crate::error::DicomError;

// =============================================================================
// Constants
// =============================================================================

/// Size of the leading preamble in bytes
pub const PREAMBLE_SIZE: usize = 128;

/// Prefix following the preamble
pub const MAGIC: &[u8; 4] = b"DICM";

/// Length value of sequences and items closed by a delimiter
const UNDEFINED_LENGTH: u32 = 0xFFFF_FFFF;

pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";

/// Prefix shared by the encapsulated (compressed) transfer syntaxes
const ENCAPSULATED_PREFIX: &str = "1.2.840.10008.1.2.";

/// VRs using the 4-byte length form in explicit VR
const LONG_VRS: &[&[u8; 2]] = &[
    b"OB", b"OD", b"OF", b"OL", b"OV", b"OW", b"SQ", b"SV", b"UC", b"UN", b"UR", b"UT", b"UV",
];

// =============================================================================
// Encoding
// =============================================================================

/// Data set encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    ImplicitLittleEndian,
    ExplicitLittleEndian,
}

impl Encoding {
    /// Resolve the data set encoding of a transfer syntax.
    ///
    /// A missing transfer syntax is read as implicit VR little endian.
    ///
    /// # Errors
    /// `UnsupportedTransferSyntax` for big endian, deflated and unknown syntaxes.
    pub fn from_transfer_syntax(uid: &str) -> Result<Self, DicomError> {
        match uid {
            "" | IMPLICIT_VR_LITTLE_ENDIAN => Ok(Encoding::ImplicitLittleEndian),
            EXPLICIT_VR_LITTLE_ENDIAN => Ok(Encoding::ExplicitLittleEndian),
            EXPLICIT_VR_BIG_ENDIAN | DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN => {
                Err(DicomError::UnsupportedTransferSyntax(uid.to_string()))
            }
            other if other.starts_with(ENCAPSULATED_PREFIX) => Ok(Encoding::ExplicitLittleEndian),
            other => Err(DicomError::UnsupportedTransferSyntax(other.to_string())),
        }
    }
}

// =============================================================================
// DataSet
// =============================================================================

/// Decoded elements of one data set (the file body or a sequence item).
#[derive(Debug, Clone, Default)]
pub struct DataSet {
    elements: BTreeMap<Tag, Bytes>,
    sequences: BTreeMap<Tag, Vec<DataSet>>,
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c| c == ' ' || c == '\0')
        .to_string()
}

impl DataSet {
    pub fn contains(&self, tag: Tag) -> bool {
        self.elements.contains_key(&tag) || self.sequences.contains_key(&tag)
    }

    /// Raw value bytes.
    pub fn raw(&self, tag: Tag) -> Option<&Bytes> {
        self.elements.get(&tag)
    }

    /// Value as text, trimmed of space and NUL padding.
    pub fn string(&self, tag: Tag) -> Option<String> {
        self.elements.get(&tag).map(|value| decode_text(value))
    }

    /// Multi-valued text split on `\`. Empty when absent or empty.
    pub fn strings(&self, tag: Tag) -> Vec<String> {
        match self.string(tag) {
            Some(value) if !value.is_empty() => value
                .split('\\')
                .map(|part| part.trim().to_string())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Integer string (IS) value.
    pub fn integer(&self, tag: Tag) -> Option<i64> {
        self.string(tag).and_then(|value| value.parse().ok())
    }

    /// Items of a sequence; empty when absent.
    pub fn sequence(&self, tag: Tag) -> &[DataSet] {
        self.sequences.get(&tag).map_or(&[], Vec::as_slice)
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        let mut tags: Vec<Tag> = self
            .elements
            .keys()
            .chain(self.sequences.keys())
            .copied()
            .collect();
        tags.sort();
        tags.into_iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len() + self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.sequences.is_empty()
    }
}

// =============================================================================
// DicomFile
// =============================================================================

/// A parsed DICOM file.
#[derive(Debug, Clone)]
pub struct DicomFile {
    path: Option<PathBuf>,
    transfer_syntax: String,
    meta: DataSet,
    data: DataSet,
}

impl DicomFile {
    /// Read and parse a file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DicomError> {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|e| DicomError::io(path, e))?;
        let mut file = Self::from_bytes(Bytes::from(content)).map_err(|e| match e {
            DicomError::NotDicom(_) => DicomError::NotDicom(path.display().to_string()),
            other => other,
        })?;
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Parse an in-memory file.
    ///
    /// # Errors
    /// - `NotDicom` if the preamble or prefix is missing
    /// - `UnsupportedTransferSyntax` for big endian or deflated data sets
    /// - `Truncated` / `InvalidElement` on malformed content
    pub fn from_bytes(data: Bytes) -> Result<Self, DicomError> {
        if data.len() < PREAMBLE_SIZE + MAGIC.len()
            || &data[PREAMBLE_SIZE..PREAMBLE_SIZE + MAGIC.len()] != MAGIC
        {
            return Err(DicomError::NotDicom("missing DICM prefix".to_string()));
        }

        let mut parser = Parser::new(data, PREAMBLE_SIZE + MAGIC.len());
        let meta = parser.read_meta()?;
        let transfer_syntax = meta.string(tag::TRANSFER_SYNTAX_UID).unwrap_or_default();
        let encoding = Encoding::from_transfer_syntax(&transfer_syntax)?;
        trace!(transfer_syntax = %transfer_syntax, ?encoding, "parsing data set");
        let data = parser.read_data_set(encoding, Scope::File, 0)?;

        Ok(Self {
            path: None,
            transfer_syntax,
            meta,
            data,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn transfer_syntax(&self) -> &str {
        &self.transfer_syntax
    }

    pub fn meta(&self) -> &DataSet {
        &self.meta
    }

    pub fn data_set(&self) -> &DataSet {
        &self.data
    }

    /// Text value of `tag`, looked up in the meta group for group 0002.
    pub fn string(&self, tag: Tag) -> Option<String> {
        if tag.is_meta() {
            self.meta.string(tag)
        } else {
            self.data.string(tag)
        }
    }

    pub fn media_storage_sop_class_uid(&self) -> Option<String> {
        self.meta.string(tag::MEDIA_STORAGE_SOP_CLASS_UID)
    }

    /// SOP class of the data set, falling back to the meta group.
    pub fn sop_class_uid(&self) -> Option<String> {
        self.data
            .string(tag::SOP_CLASS_UID)
            .filter(|uid| !uid.is_empty())
            .or_else(|| self.media_storage_sop_class_uid())
    }

    pub fn sop_instance_uid(&self) -> Option<String> {
        self.data
            .string(tag::SOP_INSTANCE_UID)
            .filter(|uid| !uid.is_empty())
            .or_else(|| self.meta.string(tag::MEDIA_STORAGE_SOP_INSTANCE_UID))
    }

    /// Whether this file is a media storage directory.
    pub fn is_dicomdir(&self) -> bool {
        self.media_storage_sop_class_uid().as_deref() == Some(MEDIA_STORAGE_DIRECTORY)
            || self.data.string(tag::SOP_CLASS_UID).as_deref() == Some(MEDIA_STORAGE_DIRECTORY)
    }

    /// Directory records of a DICOMDIR, in file order.
    pub fn records(&self) -> &[DataSet] {
        self.data.sequence(tag::DIRECTORY_RECORD_SEQUENCE)
    }
}

/// Check the `DICM` prefix of a file without parsing it.
pub fn is_dicom_file(path: &Path) -> bool {
    let mut header = [0u8; PREAMBLE_SIZE + 4];
    File::open(path)
        .and_then(|mut file| file.read_exact(&mut header))
        .map(|()| &header[PREAMBLE_SIZE..] == MAGIC)
        .unwrap_or(false)
}

// =============================================================================
// Parser
// =============================================================================

/// Sequences nested deeper than this are rejected.
const MAX_SEQUENCE_DEPTH: usize = 64;

/// Where a data set ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// End of file or pixel data
    File,
    /// Defined-length item ending at this offset
    Until(usize),
    /// Undefined-length item closed by an item delimiter
    Item,
}

#[derive(Debug, Clone, Copy)]
struct Header {
    tag: Tag,
    vr: Option<[u8; 2]>,
    length: u32,
    offset: usize,
}

impl Header {
    fn is_sequence(&self) -> bool {
        match &self.vr {
            Some(vr) => vr == b"SQ" || (vr == b"UN" && self.length == UNDEFINED_LENGTH),
            None => {
                self.length == UNDEFINED_LENGTH || tag::KNOWN_SEQUENCES.contains(&self.tag)
            }
        }
    }

    fn is_encapsulated(&self) -> bool {
        self.length == UNDEFINED_LENGTH && matches!(&self.vr, Some(vr) if vr == b"OB" || vr == b"OW")
    }
}

struct Parser {
    data: Bytes,
    pos: usize,
}

impl Parser {
    fn new(data: Bytes, pos: usize) -> Self {
        Self { data, pos }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    fn need(&self, n: usize) -> Result<(), DicomError> {
        if self.remaining() < n {
            return Err(DicomError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    fn read_u16(&mut self) -> Result<u16, DicomError> {
        self.need(2)?;
        let value = u16::from_le_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(value)
    }

    fn read_u32(&mut self) -> Result<u32, DicomError> {
        self.need(4)?;
        let bytes = &self.data[self.pos..self.pos + 4];
        let value = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        self.pos += 4;
        Ok(value)
    }

    fn read_tag(&mut self) -> Result<Tag, DicomError> {
        let group = self.read_u16()?;
        let element = self.read_u16()?;
        Ok(Tag::new(group, element))
    }

    fn peek_tag(&self) -> Result<Tag, DicomError> {
        self.need(4)?;
        let at = |i: usize| self.data[self.pos + i];
        Ok(Tag::new(
            u16::from_le_bytes([at(0), at(1)]),
            u16::from_le_bytes([at(2), at(3)]),
        ))
    }

    fn take(&mut self, n: usize) -> Result<Bytes, DicomError> {
        self.need(n)?;
        let value = self.data.slice(self.pos..self.pos + n);
        self.pos += n;
        Ok(value)
    }

    fn read_header(&mut self, encoding: Encoding) -> Result<Header, DicomError> {
        let offset = self.pos;
        let tag = self.read_tag()?;

        if tag.group == 0xFFFE || encoding == Encoding::ImplicitLittleEndian {
            let length = self.read_u32()?;
            return Ok(Header {
                tag,
                vr: None,
                length,
                offset,
            });
        }

        self.need(2)?;
        let vr = [self.data[self.pos], self.data[self.pos + 1]];
        self.pos += 2;
        if !vr.iter().all(u8::is_ascii_uppercase) {
            return Err(DicomError::InvalidElement {
                offset,
                message: format!("invalid VR {vr:02X?} for {tag}"),
            });
        }

        let length = if LONG_VRS.contains(&&vr) {
            self.read_u16()?;
            self.read_u32()?
        } else {
            u32::from(self.read_u16()?)
        };

        Ok(Header {
            tag,
            vr: Some(vr),
            length,
            offset,
        })
    }

    /// File meta group: explicit VR little endian, group 0002 only.
    fn read_meta(&mut self) -> Result<DataSet, DicomError> {
        let mut meta = DataSet::default();
        while self.remaining() >= 4 && self.peek_tag()?.is_meta() {
            let header = self.read_header(Encoding::ExplicitLittleEndian)?;
            if header.length == UNDEFINED_LENGTH {
                return Err(DicomError::InvalidElement {
                    offset: header.offset,
                    message: format!("undefined length in meta element {}", header.tag),
                });
            }
            let value = self.take(header.length as usize)?;
            meta.elements.insert(header.tag, value);
        }
        Ok(meta)
    }

    fn read_data_set(
        &mut self,
        encoding: Encoding,
        scope: Scope,
        depth: usize,
    ) -> Result<DataSet, DicomError> {
        let mut set = DataSet::default();

        loop {
            match scope {
                Scope::File if self.remaining() == 0 => break,
                Scope::Until(end) if self.pos >= end => break,
                _ => {}
            }

            let tag = self.peek_tag()?;
            if tag == tag::ITEM_DELIMITATION {
                self.read_tag()?;
                self.read_u32()?;
                break;
            }
            if tag == tag::PIXEL_DATA && scope == Scope::File {
                debug!(offset = self.pos, "pixel data reached, stopping");
                break;
            }

            let header = self.read_header(encoding)?;
            if header.is_encapsulated() {
                self.skip_fragments()?;
            } else if header.is_sequence() {
                if depth >= MAX_SEQUENCE_DEPTH {
                    return Err(DicomError::InvalidElement {
                        offset: header.offset,
                        message: format!(
                            "sequence {} nested deeper than {MAX_SEQUENCE_DEPTH} levels",
                            header.tag
                        ),
                    });
                }
                // UN sequences of undefined length are always implicit VR.
                let item_encoding = match &header.vr {
                    Some(vr) if vr == b"UN" => Encoding::ImplicitLittleEndian,
                    _ => encoding,
                };
                let items = self.read_sequence(item_encoding, header.length, depth + 1)?;
                set.sequences.insert(header.tag, items);
            } else if header.length == UNDEFINED_LENGTH {
                return Err(DicomError::InvalidElement {
                    offset: header.offset,
                    message: format!("undefined length on {}", header.tag),
                });
            } else {
                let value = self.take(header.length as usize)?;
                set.elements.insert(header.tag, value);
            }
        }

        Ok(set)
    }

    fn read_sequence(
        &mut self,
        encoding: Encoding,
        length: u32,
        depth: usize,
    ) -> Result<Vec<DataSet>, DicomError> {
        let end = if length == UNDEFINED_LENGTH {
            None
        } else {
            self.need(length as usize)?;
            Some(self.pos + length as usize)
        };

        let mut items = Vec::new();
        loop {
            if matches!(end, Some(end) if self.pos >= end) {
                break;
            }

            let offset = self.pos;
            let tag = self.read_tag()?;
            let item_length = self.read_u32()?;

            if tag == tag::SEQUENCE_DELIMITATION {
                break;
            }
            if tag != tag::ITEM {
                return Err(DicomError::InvalidElement {
                    offset,
                    message: format!("expected item in sequence, found {tag}"),
                });
            }

            let item = if item_length == UNDEFINED_LENGTH {
                self.read_data_set(encoding, Scope::Item, depth)?
            } else {
                self.need(item_length as usize)?;
                let item_end = self.pos + item_length as usize;
                let item = self.read_data_set(encoding, Scope::Until(item_end), depth)?;
                self.pos = item_end;
                item
            };
            items.push(item);
        }

        Ok(items)
    }

    /// Skip encapsulated fragments up to the sequence delimiter.
    fn skip_fragments(&mut self) -> Result<(), DicomError> {
        loop {
            let tag = self.read_tag()?;
            let length = self.read_u32()?;
            if tag == tag::SEQUENCE_DELIMITATION {
                return Ok(());
            }
            self.take(length as usize)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::testing::{file_bytes, DataSetWriter, InstanceSpec, CT_IMAGE};

    #[test]
    fn test_parse_explicit_instance() {
        let bytes = InstanceSpec::new("1.2.3.4", CT_IMAGE, "1.2.3.4.1")
            .number(7)
            .bytes();
        let file = DicomFile::from_bytes(Bytes::from(bytes)).unwrap();

        assert_eq!(file.transfer_syntax(), EXPLICIT_VR_LITTLE_ENDIAN);
        assert_eq!(file.sop_class_uid().as_deref(), Some(CT_IMAGE));
        assert_eq!(file.string(tag::SERIES_INSTANCE_UID).as_deref(), Some("1.2.3.4"));
        assert_eq!(file.string(tag::MODALITY).as_deref(), Some("CT"));
        assert_eq!(file.data_set().integer(tag::INSTANCE_NUMBER), Some(7));
        assert_eq!(
            file.data_set().strings(tag::PERFORMING_PHYSICIAN_NAME),
            vec!["Doe^John", "Roe^Jane"]
        );
        assert!(!file.data_set().contains(tag::PIXEL_DATA));
        assert!(!file.is_dicomdir());
    }

    #[test]
    fn test_parse_implicit_with_sequences() {
        let item = DataSetWriter::implicit()
            .string(tag::DIRECTORY_RECORD_TYPE, b"CS", "SERIES")
            .string(tag::SERIES_INSTANCE_UID, b"UI", "1.2.3");
        let body = DataSetWriter::implicit()
            .sequence(tag::DIRECTORY_RECORD_SEQUENCE, &[item.clone(), item.clone()], false)
            .sequence(tag::REFERENCED_IMAGE_SEQUENCE, &[item], true)
            .string(tag::PATIENT_ID, b"LO", "P1");
        let bytes = file_bytes(IMPLICIT_VR_LITTLE_ENDIAN, CT_IMAGE, "1.9", &body);

        let file = DicomFile::from_bytes(Bytes::from(bytes)).unwrap();
        assert_eq!(file.records().len(), 2);
        assert_eq!(
            file.records()[1].string(tag::DIRECTORY_RECORD_TYPE).as_deref(),
            Some("SERIES")
        );
        assert_eq!(file.data_set().sequence(tag::REFERENCED_IMAGE_SEQUENCE).len(), 1);
        assert_eq!(file.string(tag::PATIENT_ID).as_deref(), Some("P1"));
    }

    #[test]
    fn test_parse_explicit_undefined_length_items() {
        let item = DataSetWriter::explicit().string(tag::REFERENCED_FILE_ID, b"CS", "DIR\\IM1");
        let body = DataSetWriter::explicit().sequence(
            tag::DIRECTORY_RECORD_SEQUENCE,
            &[item.clone(), item],
            true,
        );
        let bytes = file_bytes(EXPLICIT_VR_LITTLE_ENDIAN, MEDIA_STORAGE_DIRECTORY, "1.9", &body);

        let file = DicomFile::from_bytes(Bytes::from(bytes)).unwrap();
        assert!(file.is_dicomdir());
        assert_eq!(file.records().len(), 2);
        assert_eq!(
            file.records()[0].strings(tag::REFERENCED_FILE_ID),
            vec!["DIR", "IM1"]
        );
    }

    #[test]
    fn test_rejects_runaway_sequence_nesting() {
        let mut bytes = file_bytes(
            EXPLICIT_VR_LITTLE_ENDIAN,
            CT_IMAGE,
            "1.9",
            &DataSetWriter::explicit(),
        );
        // Undefined-length sequence whose single item opens the next one.
        for _ in 0..200_000 {
            bytes.extend_from_slice(&[0x08, 0x00, 0x15, 0x11]);
            bytes.extend_from_slice(b"SQ\0\0");
            bytes.extend_from_slice(&UNDEFINED_LENGTH.to_le_bytes());
            bytes.extend_from_slice(&[0xFE, 0xFF, 0x00, 0xE0]);
            bytes.extend_from_slice(&UNDEFINED_LENGTH.to_le_bytes());
        }

        let result = DicomFile::from_bytes(Bytes::from(bytes));
        assert!(matches!(
            result,
            Err(DicomError::InvalidElement { message, .. }) if message.contains("nested deeper")
        ));
    }

    #[test]
    fn test_accepts_moderate_sequence_nesting() {
        let mut item = DataSetWriter::explicit().string(tag::PATIENT_ID, b"LO", "P1");
        for _ in 0..10 {
            item =
                DataSetWriter::explicit().sequence(tag::REFERENCED_IMAGE_SEQUENCE, &[item], true);
        }
        let bytes = file_bytes(EXPLICIT_VR_LITTLE_ENDIAN, CT_IMAGE, "1.9", &item);
        let file = DicomFile::from_bytes(Bytes::from(bytes)).unwrap();
        assert_eq!(file.data_set().sequence(tag::REFERENCED_IMAGE_SEQUENCE).len(), 1);
    }

    #[test]
    fn test_stops_at_pixel_data() {
        let body = DataSetWriter::explicit()
            .string(tag::PATIENT_ID, b"LO", "P1")
            .raw(tag::PIXEL_DATA, b"OW", &[1, 2, 3, 4])
            // Garbage after the pixel data is never read.
            .raw(Tag::new(0xFFFA, 0xFFFA), b"OB", &[0xFF; 6]);
        let bytes = file_bytes(EXPLICIT_VR_LITTLE_ENDIAN, CT_IMAGE, "1.9", &body);
        let file = DicomFile::from_bytes(Bytes::from(bytes)).unwrap();
        assert_eq!(file.data_set().len(), 1);
    }

    #[test]
    fn test_rejects_unsupported_syntaxes() {
        let body = DataSetWriter::explicit().string(tag::PATIENT_ID, b"LO", "P1");
        for syntax in [EXPLICIT_VR_BIG_ENDIAN, DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN] {
            let bytes = file_bytes(syntax, CT_IMAGE, "1.9", &body);
            assert!(matches!(
                DicomFile::from_bytes(Bytes::from(bytes)),
                Err(DicomError::UnsupportedTransferSyntax(uid)) if uid == syntax
            ));
        }
    }

    #[test]
    fn test_encapsulated_syntax_reads_as_explicit() {
        assert_eq!(
            Encoding::from_transfer_syntax("1.2.840.10008.1.2.4.50").unwrap(),
            Encoding::ExplicitLittleEndian
        );
        assert!(Encoding::from_transfer_syntax("1.2.3").is_err());
    }

    #[test]
    fn test_rejects_missing_prefix() {
        let result = DicomFile::from_bytes(Bytes::from(vec![0u8; 200]));
        assert!(matches!(result, Err(DicomError::NotDicom(_))));
    }

    #[test]
    fn test_truncated_element() {
        let mut bytes = InstanceSpec::new("1.2.3", CT_IMAGE, "1.2.3.1").bytes();
        let meta_end = PREAMBLE_SIZE + 4 + 100;
        bytes.truncate(meta_end);
        assert!(matches!(
            DicomFile::from_bytes(Bytes::from(bytes)),
            Err(DicomError::Truncated { .. })
        ));
    }

    #[test]
    fn test_is_dicom_file() {
        let dir = tempfile::tempdir().unwrap();
        let dicom = InstanceSpec::new("1.2.3", CT_IMAGE, "1.2.3.1").write(dir.path(), "a.dcm");
        let text = dir.path().join("notes.txt");
        std::fs::write(&text, "hello").unwrap();

        assert!(is_dicom_file(&dicom));
        assert!(!is_dicom_file(&text));
        assert!(!is_dicom_file(&dir.path().join("missing")));

        let file = DicomFile::open(&dicom).unwrap();
        assert_eq!(file.path(), Some(dicom.as_path()));
        assert!(matches!(DicomFile::open(&text), Err(DicomError::NotDicom(_))));
    }
}
