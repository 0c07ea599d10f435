//! Service configuration.
//!
//! Configurations are plain serde structures, usually loaded from JSON:
//!
//! ```json
//! {
//!   "uid": "reader",
//!   "type": "sight::io::dicom::series_set_reader",
//!   "worker": "io",
//!   "objects": [ { "uid": "seriesSet", "key": "data", "access": "out" } ],
//!   "params": { "folder": "/data/patient", "dicomdir": true }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::data::Access;
use crate::error::ServiceError;

/// Binding of one configured object to a data pointer of the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectServiceConfig {
    /// Object uid (or deferred id for outputs).
    pub uid: String,
    /// Pointer key in the service.
    pub key: String,
    pub access: Access,
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default)]
    pub optional: bool,
    /// Index for pointer groups.
    #[serde(default)]
    pub index: Option<usize>,
}

/// Configuration of one service instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub uid: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Name of the worker the service slots run on.
    #[serde(default)]
    pub worker: Option<String>,
    /// Auto-connect every bound object.
    #[serde(default)]
    pub auto_connect: bool,
    #[serde(default)]
    pub objects: Vec<ObjectServiceConfig>,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl ServiceConfig {
    pub fn new(uid: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Add an object binding.
    pub fn with_object(mut self, uid: &str, key: &str, access: Access) -> Self {
        self.objects.push(ObjectServiceConfig {
            uid: uid.to_string(),
            key: key.to_string(),
            access,
            auto_connect: false,
            optional: false,
            index: None,
        });
        self
    }

    /// Set one parameter.
    pub fn with_param(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        if !self.params.is_object() {
            self.params = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(params) = self.params.as_object_mut() {
            params.insert(name.to_string(), value.into());
        }
        self
    }

    /// String parameter, `None` when absent, not a string or empty.
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(serde_json::Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Mandatory string parameter.
    pub fn required_param(&self, name: &str) -> Result<&str, ServiceError> {
        self.param_str(name).ok_or_else(|| {
            ServiceError::Configuration(format!(
                "service '{}': missing mandatory parameter '{name}'",
                self.uid
            ))
        })
    }

    /// Boolean parameter; accepts JSON booleans and the strings
    /// `"true"`/`"false"`.
    pub fn param_bool(&self, name: &str, default: bool) -> Result<bool, ServiceError> {
        match self.params.get(name) {
            None | Some(serde_json::Value::Null) => Ok(default),
            Some(serde_json::Value::Bool(value)) => Ok(*value),
            Some(serde_json::Value::String(s)) if s == "true" => Ok(true),
            Some(serde_json::Value::String(s)) if s == "false" => Ok(false),
            Some(other) => Err(ServiceError::Configuration(format!(
                "service '{}': parameter '{name}' must be a boolean, got {other}",
                self.uid
            ))),
        }
    }

    /// List of strings; a single string is split on commas.
    pub fn param_str_list(&self, name: &str) -> Vec<String> {
        match self.params.get(name) {
            Some(serde_json::Value::Array(values)) => values
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(serde_json::Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}
