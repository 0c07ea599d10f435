//! Command line configuration for `sight-dicom`.
//!
//! The binary has two subcommands:
//! - `read`: run the series set reader service on a folder
//! - `scan`: only search and group the files of a folder into series
//!
//! # Environment Variables
//!
//! - `SIGHT_DICOMDIR` - Look for a DICOMDIR first (default: false)
//! - `SIGHT_FILTER` - Filter applied before conversion
//! - `SIGHT_SOP_CLASSES` - Comma-separated SOP class allow-list
//! - `SIGHT_JSON` - Print the report as JSON (default: false)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::dicom::filter::FILTERS;

// =============================================================================
// CLI Arguments
// =============================================================================

/// sight-dicom - Read DICOM folders into series sets.
#[derive(Parser, Debug, Clone)]
#[command(name = "sight-dicom")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Read a folder into a series set and print a summary.
    Read(ReadConfig),

    /// Group the files of a folder into series without converting them.
    Scan(ScanConfig),
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Options of `sight-dicom read`.
#[derive(Args, Debug, Clone)]
pub struct ReadConfig {
    /// Folder to read.
    pub folder: PathBuf,

    /// Look for a DICOMDIR before searching the folder.
    #[arg(long, default_value_t = false, env = "SIGHT_DICOMDIR")]
    pub dicomdir: bool,

    /// Filter applied to every series before conversion.
    #[arg(long, env = "SIGHT_FILTER")]
    pub filter: Option<String>,

    /// SOP class UID allowed for conversion (repeatable).
    ///
    /// If not specified, every SOP class is converted.
    #[arg(
        long = "sop-class",
        env = "SIGHT_SOP_CLASSES",
        value_delimiter = ','
    )]
    pub sop_classes: Vec<String>,

    /// Print the report as JSON.
    #[arg(long, default_value_t = false, env = "SIGHT_JSON")]
    pub json: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ReadConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_folder(&self.folder)?;

        if let Some(filter) = &self.filter {
            if !FILTERS.contains(&filter.as_str()) {
                return Err(format!(
                    "Unknown filter '{}'. Available filters: {}",
                    filter,
                    FILTERS.join(", ")
                ));
            }
        }

        if let Some(uid) = self.sop_classes.iter().find(|uid| !is_uid(uid)) {
            return Err(format!("'{uid}' is not a valid SOP class UID"));
        }

        Ok(())
    }
}

/// Options of `sight-dicom scan`.
#[derive(Args, Debug, Clone)]
pub struct ScanConfig {
    /// Folder to scan.
    pub folder: PathBuf,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl ScanConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        validate_folder(&self.folder)
    }
}

fn validate_folder(folder: &std::path::Path) -> Result<(), String> {
    if folder.as_os_str().is_empty() {
        return Err("A folder is required".to_string());
    }
    if !folder.is_dir() {
        return Err(format!("{} is not a folder", folder.display()));
    }
    Ok(())
}

/// Dotted numeric UID, at most 64 characters.
fn is_uid(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 64
        && value
            .split('.')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(folder: PathBuf) -> ReadConfig {
        ReadConfig {
            folder,
            dicomdir: false,
            filter: None,
            sop_classes: Vec::new(),
            json: false,
            verbose: false,
        }
    }

    #[test]
    fn test_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_path_buf());
        config.filter = Some("sop_class_uid_splitter".to_string());
        config.sop_classes = vec!["1.2.840.10008.5.1.4.1.1.2".to_string()];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().join("missing"));
        assert!(config.validate().unwrap_err().contains("not a folder"));

        let scan = ScanConfig {
            folder: PathBuf::new(),
            verbose: false,
        };
        assert!(scan.validate().is_err());
    }

    #[test]
    fn test_unknown_filter() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_path_buf());
        config.filter = Some("nope".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.contains("instance_number_sorter"));
    }

    #[test]
    fn test_invalid_sop_class() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path().to_path_buf());
        config.sop_classes = vec!["1.2..3".to_string()];
        assert!(config.validate().is_err());
        config.sop_classes = vec!["1.2.a".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_read_command() {
        let cli = Cli::try_parse_from([
            "sight-dicom",
            "read",
            "/data",
            "--dicomdir",
            "--sop-class",
            "1.2.3",
            "--sop-class",
            "1.2.4",
            "-v",
        ])
        .unwrap();

        match cli.into_command() {
            Command::Read(config) => {
                assert_eq!(config.folder, PathBuf::from("/data"));
                assert!(config.dicomdir);
                assert!(config.verbose);
                assert_eq!(config.sop_classes, vec!["1.2.3", "1.2.4"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_scan_command() {
        let cli = Cli::try_parse_from(["sight-dicom", "scan", "/data"]).unwrap();
        assert!(matches!(cli.into_command(), Command::Scan(config) if !config.verbose));
    }
}
