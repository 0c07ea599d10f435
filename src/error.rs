use std::path::PathBuf;

use thiserror::Error;

use crate::data::Access;

/// Errors raised by the signal/slot bus and its workers
#[derive(Debug, Clone, Error)]
pub enum ComError {
    /// Asynchronous call on a slot that has no worker
    #[error("Slot '{0}' has no worker to run on")]
    NoWorker(String),

    /// The worker queue is closed
    #[error("Worker '{0}' is stopped")]
    WorkerStopped(String),

    /// The task was dropped before producing a result (worker stopped or task panicked)
    #[error("Task result dropped before completion")]
    TaskDropped,

    /// No signal registered under this key
    #[error("Unknown signal: {0}")]
    UnknownSignal(String),

    /// No slot registered under this key
    #[error("Unknown slot: {0}")]
    UnknownSlot(String),

    /// Signal or slot exists but with another argument type
    #[error("Signature mismatch for '{key}': expected {expected}")]
    SignatureMismatch { key: String, expected: &'static str },

    /// Key already registered on the holder
    #[error("Key already registered: {0}")]
    DuplicateKey(String),
}

/// Errors related to data objects and data pointers
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// The object payload is not of the requested kind
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// The pointer was declared with another access mode
    #[error("Access mismatch for '{key}': declared as {declared}, used as {requested}")]
    AccessMismatch {
        key: String,
        declared: Access,
        requested: Access,
    },

    /// No pointer registered under this key
    #[error("Unknown data key: {0}")]
    UnknownKey(String),

    /// The referenced object has been released
    #[error("Object behind '{0}' is no longer available")]
    Expired(String),
}

/// Errors raised by service lifecycle operations
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// Lifecycle transition not allowed from the current state
    #[error("Cannot {operation} service '{service}' while {state}")]
    InvalidState {
        service: String,
        operation: &'static str,
        state: &'static str,
    },

    /// A non-optional object is not bound
    #[error("Service '{service}' is missing required object '{key}'")]
    MissingObject { service: String, key: String },

    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No constructor registered for this implementation name
    #[error("Unknown service implementation: {0}")]
    UnknownImplementation(String),

    /// Error raised by a service hook
    #[error("Service '{service}' failed: {message}")]
    Failed { service: String, message: String },

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Communication error: {0}")]
    Com(#[from] ComError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// Errors raised by the object-service registry
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Unregistering a service that is still running
    #[error("Service '{0}' must be stopped before it is unregistered")]
    ServiceNotStopped(String),

    /// The service is not part of the registry
    #[error("Service '{0}' is not registered")]
    ServiceNotRegistered(String),

    /// The service is already part of the registry
    #[error("Service '{0}' is already registered")]
    AlreadyRegistered(String),

    /// No binding for this key and access mode
    #[error("Service '{service}' has no {access} binding for '{key}'")]
    UnknownBinding {
        service: String,
        key: String,
        access: Access,
    },
}

/// Errors raised by jobs and aggregators
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// Waiting on a job that has not been started
    #[error("Job '{0}' has not been started")]
    NotStarted(String),

    /// A stage failed while the job was running
    #[error("Job '{name}' failed: {message}")]
    Failed { name: String, message: String },
}

/// Errors that can occur while reading DICOM files and series
#[derive(Debug, Clone, Error)]
pub enum DicomError {
    /// File system error
    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Missing preamble or `DICM` prefix
    #[error("Not a DICOM file: {0}")]
    NotDicom(String),

    /// Data ends in the middle of an element
    #[error("Truncated data at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Big endian, deflated or otherwise unsupported encoding
    #[error("Unsupported transfer syntax: {0}")]
    UnsupportedTransferSyntax(String),

    /// Malformed element header
    #[error("Invalid element at offset {offset}: {message}")]
    InvalidElement { offset: usize, message: String },

    /// Input folder does not exist or is not a directory
    #[error("Folder not found: {0}")]
    FolderNotFound(PathBuf),

    /// A series mixes several SOP classes and must be split first
    #[error(
        "The series {series} contains several SOPClassUIDs ({}). Try to apply a filter in order to split the series.",
        .uids.join(", ")
    )]
    SeveralSopClassUids { series: String, uids: Vec<String> },

    /// A series with no instance
    #[error("The series {0} doesn't contain any instance")]
    EmptySeries(String),

    /// Filter name not registered
    #[error("Unknown DICOM filter: {0}")]
    UnknownFilter(String),

    /// A filter could not process a series
    #[error("Filter {filter} failed: {message}")]
    FilterFailed { filter: String, message: String },

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Data error: {0}")]
    Data(#[from] DataError),
}

impl DicomError {
    /// Build an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        DicomError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
