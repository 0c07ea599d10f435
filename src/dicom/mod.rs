//! DICOM series set reading.
//!
//! - [`file`]: Part 10 file parsing (implicit and explicit VR little endian)
//! - [`dicomdir`] / [`search`]: locate the files of a folder
//! - [`scanner`]: group files into [`DicomSeries`] and complete them
//! - [`filter`]: optional series transformations
//! - [`reader`]: the phased pipeline producing a `SeriesSet`
//! - [`service`]: the pipeline as a registry-managed service

pub mod dicomdir;
pub mod file;
pub mod filter;
pub mod reader;
pub mod scanner;
pub mod search;
pub mod series;
pub mod service;
pub mod sop_class;
pub mod tag;

#[cfg(test)]
pub(crate) mod testing;

pub use self::dicomdir::{dicomdir_path, read_dicomdir};
pub use self::file::{is_dicom_file, DataSet, DicomFile, Encoding};
pub use self::filter::{apply_filter, DicomFilter, InstanceNumberSorter, SopClassUidSplitter};
pub use self::reader::{dicom_series_comparator, ReadReport, ReaderOptions, SeriesSetReader};
pub use self::scanner::SeriesScanner;
pub use self::search::search_recursively;
pub use self::series::{DicomInstance, DicomSeries};
pub use self::service::{register, SeriesSetReaderService, SERIES_SET_READER};
pub use self::tag::Tag;
