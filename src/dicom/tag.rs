//! Data element tags.

use std::fmt;

/// A `(group, element)` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag {
    pub group: u16,
    pub element: u16,
}

impl Tag {
    pub const fn new(group: u16, element: u16) -> Self {
        Self { group, element }
    }

    /// Whether the tag belongs to the file meta information group.
    pub fn is_meta(&self) -> bool {
        self.group == 0x0002
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:04X},{:04X})", self.group, self.element)
    }
}

// =============================================================================
// File meta information
// =============================================================================

pub const MEDIA_STORAGE_SOP_CLASS_UID: Tag = Tag::new(0x0002, 0x0002);
pub const MEDIA_STORAGE_SOP_INSTANCE_UID: Tag = Tag::new(0x0002, 0x0003);
pub const TRANSFER_SYNTAX_UID: Tag = Tag::new(0x0002, 0x0010);

// =============================================================================
// Directory records
// =============================================================================

pub const DIRECTORY_RECORD_SEQUENCE: Tag = Tag::new(0x0004, 0x1220);
pub const DIRECTORY_RECORD_TYPE: Tag = Tag::new(0x0004, 0x1430);
pub const REFERENCED_FILE_ID: Tag = Tag::new(0x0004, 0x1500);
pub const REFERENCED_SOP_CLASS_UID_IN_FILE: Tag = Tag::new(0x0004, 0x1510);
pub const REFERENCED_SOP_INSTANCE_UID_IN_FILE: Tag = Tag::new(0x0004, 0x1511);

// =============================================================================
// Instance, series and equipment
// =============================================================================

pub const SPECIFIC_CHARACTER_SET: Tag = Tag::new(0x0008, 0x0005);
pub const SOP_CLASS_UID: Tag = Tag::new(0x0008, 0x0016);
pub const SOP_INSTANCE_UID: Tag = Tag::new(0x0008, 0x0018);
pub const STUDY_DATE: Tag = Tag::new(0x0008, 0x0020);
pub const SERIES_DATE: Tag = Tag::new(0x0008, 0x0021);
pub const STUDY_TIME: Tag = Tag::new(0x0008, 0x0030);
pub const SERIES_TIME: Tag = Tag::new(0x0008, 0x0031);
pub const MODALITY: Tag = Tag::new(0x0008, 0x0060);
pub const INSTITUTION_NAME: Tag = Tag::new(0x0008, 0x0080);
pub const REFERRING_PHYSICIAN_NAME: Tag = Tag::new(0x0008, 0x0090);
pub const STUDY_DESCRIPTION: Tag = Tag::new(0x0008, 0x1030);
pub const SERIES_DESCRIPTION: Tag = Tag::new(0x0008, 0x103E);
pub const PERFORMING_PHYSICIAN_NAME: Tag = Tag::new(0x0008, 0x1050);
pub const REFERENCED_SERIES_SEQUENCE: Tag = Tag::new(0x0008, 0x1115);
pub const REFERENCED_IMAGE_SEQUENCE: Tag = Tag::new(0x0008, 0x1140);

// =============================================================================
// Patient and study
// =============================================================================

pub const PATIENT_NAME: Tag = Tag::new(0x0010, 0x0010);
pub const PATIENT_ID: Tag = Tag::new(0x0010, 0x0020);
pub const PATIENT_BIRTH_DATE: Tag = Tag::new(0x0010, 0x0030);
pub const PATIENT_SEX: Tag = Tag::new(0x0010, 0x0040);
pub const PATIENT_AGE: Tag = Tag::new(0x0010, 0x1010);
pub const STUDY_INSTANCE_UID: Tag = Tag::new(0x0020, 0x000D);
pub const SERIES_INSTANCE_UID: Tag = Tag::new(0x0020, 0x000E);
pub const INSTANCE_NUMBER: Tag = Tag::new(0x0020, 0x0013);

// =============================================================================
// Encoding
// =============================================================================

pub const PIXEL_DATA: Tag = Tag::new(0x7FE0, 0x0010);
pub const ITEM: Tag = Tag::new(0xFFFE, 0xE000);
pub const ITEM_DELIMITATION: Tag = Tag::new(0xFFFE, 0xE00D);
pub const SEQUENCE_DELIMITATION: Tag = Tag::new(0xFFFE, 0xE0DD);

/// Sequences recognised in implicit VR data sets with a defined length.
pub(crate) const KNOWN_SEQUENCES: &[Tag] = &[
    DIRECTORY_RECORD_SEQUENCE,
    REFERENCED_SERIES_SEQUENCE,
    REFERENCED_IMAGE_SEQUENCE,
];
