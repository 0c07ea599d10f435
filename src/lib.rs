//! # sight-core
//!
//! Core runtime of a medical imaging application framework: typed
//! signal/slot communication, shared data objects, services managed by an
//! object-service registry, progress-reporting jobs, and a DICOM reader
//! that turns a folder of files into a series set.
//!
//! ## Architecture
//!
//! - [`com`] - Signals, slots, workers
//! - [`data`] - Data objects and the data pointers services hold
//! - [`service`] - Service lifecycle, factory, registry, app configurations
//! - [`jobs`] - Jobs, observers and aggregators
//! - [`dicom`] - DICOM folder reading into a series set
//! - [`logger`] - Leveled log collected during a read
//! - [`config`] - CLI types of `sight-dicom`
//!
//! ## Example
//!
//! ```rust,no_run
//! use sight_core::data::{Object, SeriesSet};
//! use sight_core::dicom::{ReaderOptions, SeriesSetReader};
//!
//! let reader = SeriesSetReader::new("/data/patient", ReaderOptions::default());
//! let set = Object::new(SeriesSet::new());
//! let report = reader.read(&set).unwrap();
//! println!("{} series read", report.converted);
//! ```

pub mod com;
pub mod config;
pub mod data;
pub mod dicom;
pub mod error;
pub mod jobs;
pub mod logger;
pub mod service;

// Re-export commonly used types
pub use config::{Cli, Command, ReadConfig, ScanConfig};
pub use error::{ComError, DataError, DicomError, JobError, RegistryError, ServiceError};
pub use logger::{LogEntry, LogLevel, Logger};
