//! Series descriptors accumulated before conversion.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use super::file::DataSet;
use super::tag;
use crate::data::{Equipment, Patient, Series, Study};

/// One file of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DicomInstance {
    pub path: PathBuf,
    pub sop_class_uid: String,
    pub sop_instance_uid: String,
    pub instance_number: Option<i64>,
}

/// A partially populated series.
///
/// Built from file headers or DICOMDIR records, completed with the patient,
/// study and equipment of its first instance, then converted to a
/// [`Series`] object.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DicomSeries {
    pub instance_uid: String,
    pub modality: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub performing_physicians: Vec<String>,
    pub sop_class_uids: BTreeSet<String>,
    pub instances: Vec<DicomInstance>,
    pub number_of_instances: usize,
    pub patient: Patient,
    pub study: Study,
    pub equipment: Equipment,
}

impl DicomSeries {
    pub fn new(instance_uid: impl Into<String>) -> Self {
        Self {
            instance_uid: instance_uid.into(),
            ..Self::default()
        }
    }

    /// Append an instance and record its SOP class.
    pub fn add_instance(&mut self, instance: DicomInstance) {
        if !instance.sop_class_uid.is_empty() {
            self.sop_class_uids.insert(instance.sop_class_uid.clone());
        }
        self.instances.push(instance);
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Smallest SOP class UID, used for ordering.
    pub fn first_sop_class_uid(&self) -> Option<&str> {
        self.sop_class_uids.iter().next().map(String::as_str)
    }

    /// Copy of the series-level attributes with no instance.
    pub fn empty_copy(&self) -> Self {
        Self {
            instances: Vec::new(),
            sop_class_uids: BTreeSet::new(),
            number_of_instances: 0,
            ..self.clone()
        }
    }

    /// Set the series-level attributes from a data set.
    pub(crate) fn read_series_attributes(&mut self, data: &DataSet) {
        self.modality = data.string(tag::MODALITY).unwrap_or_default();
        self.date = data.string(tag::SERIES_DATE).unwrap_or_default();
        self.time = data.string(tag::SERIES_TIME).unwrap_or_default();
        self.description = data.string(tag::SERIES_DESCRIPTION).unwrap_or_default();
        self.performing_physicians = data.strings(tag::PERFORMING_PHYSICIAN_NAME);
    }

    /// Build the converted series payload.
    pub fn to_series(&self) -> Series {
        Series {
            instance_uid: self.instance_uid.clone(),
            modality: self.modality.clone(),
            description: self.description.clone(),
            date: self.date.clone(),
            time: self.time.clone(),
            performing_physicians: self.performing_physicians.clone(),
            sop_class_uid: self.first_sop_class_uid().unwrap_or_default().to_string(),
            number_of_instances: self.instances.len(),
            patient: self.patient.clone(),
            study: self.study.clone(),
            equipment: self.equipment.clone(),
            instance_paths: self.instances.iter().map(|i| i.path.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(name: &str, sop_class: &str) -> DicomInstance {
        DicomInstance {
            path: PathBuf::from(name),
            sop_class_uid: sop_class.to_string(),
            sop_instance_uid: format!("{name}.uid"),
            instance_number: None,
        }
    }

    #[test]
    fn test_sop_classes_are_collected() {
        let mut series = DicomSeries::new("1.2.3");
        series.add_instance(instance("a", "1.1"));
        series.add_instance(instance("b", "1.1"));
        series.add_instance(instance("c", "1.0"));
        series.add_instance(instance("d", ""));

        assert_eq!(series.len(), 4);
        assert_eq!(series.sop_class_uids.len(), 2);
        assert_eq!(series.first_sop_class_uid(), Some("1.0"));
    }

    #[test]
    fn test_to_series_copies_attributes() {
        let mut series = DicomSeries::new("1.2.3");
        series.modality = "MR".into();
        series.patient.patient_id = "P1".into();
        series.add_instance(instance("a", "1.1"));

        let converted = series.to_series();
        assert_eq!(converted.instance_uid, "1.2.3");
        assert_eq!(converted.modality, "MR");
        assert_eq!(converted.sop_class_uid, "1.1");
        assert_eq!(converted.number_of_instances, 1);
        assert_eq!(converted.patient.patient_id, "P1");
        assert_eq!(converted.instance_paths, vec![PathBuf::from("a")]);
    }

    #[test]
    fn test_empty_copy_keeps_series_attributes() {
        let mut series = DicomSeries::new("1.2.3");
        series.description = "Head".into();
        series.add_instance(instance("a", "1.1"));

        let copy = series.empty_copy();
        assert_eq!(copy.description, "Head");
        assert!(copy.is_empty());
        assert!(copy.sop_class_uids.is_empty());
    }
}
