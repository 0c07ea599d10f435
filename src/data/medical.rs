//! Payload types carried by data objects.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use super::object::Object;

// =============================================================================
// Medical identification
// =============================================================================

/// Patient identification module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Patient {
    pub patient_id: String,
    pub name: String,
    pub birthdate: String,
    pub sex: String,
}

/// Study identification module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Study {
    pub instance_uid: String,
    pub date: String,
    pub time: String,
    pub referring_physician_name: String,
    pub description: String,
    pub patient_age: String,
}

/// General equipment module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Equipment {
    pub institution_name: String,
}

// =============================================================================
// Payloads
// =============================================================================

/// A DICOM series once converted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Series {
    pub instance_uid: String,
    pub modality: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub performing_physicians: Vec<String>,
    pub sop_class_uid: String,
    pub number_of_instances: usize,
    pub patient: Patient,
    pub study: Study,
    pub equipment: Equipment,
    pub instance_paths: Vec<PathBuf>,
}

/// Ordered collection of series objects.
#[derive(Debug, Clone, Default)]
pub struct SeriesSet {
    series: Vec<Arc<Object>>,
}

impl SeriesSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, series: Arc<Object>) {
        self.series.push(series);
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Object>> {
        self.series.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Object>> {
        self.series.iter()
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }
}

/// A 3D image buffer with its geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub size: [usize; 3],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub pixel_type: String,
    pub buffer: Vec<u8>,
}

impl Default for Image {
    fn default() -> Self {
        Self {
            size: [0; 3],
            spacing: [1.0; 3],
            origin: [0.0; 3],
            pixel_type: "uint8".to_string(),
            buffer: Vec::new(),
        }
    }
}

/// Row-major 4x4 transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix4 {
    pub coefficients: [f64; 16],
}

impl Default for Matrix4 {
    fn default() -> Self {
        let mut coefficients = [0.0; 16];
        for i in 0..4 {
            coefficients[i * 5] = 1.0;
        }
        Self { coefficients }
    }
}

/// Ordered list of objects.
#[derive(Debug, Clone, Default)]
pub struct Vector(pub Vec<Arc<Object>>);

/// Objects keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Composite(pub BTreeMap<String, Arc<Object>>);

/// Text value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringValue(pub String);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Integer(pub i64);

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Float(pub f64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Boolean(pub bool);
