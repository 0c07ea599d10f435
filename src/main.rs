//! sight-dicom - Read DICOM folders into series sets.
//!
//! `read` drives the series set reader service through an object-service
//! registry, `scan` only groups the files of a folder into series.

use clap::Parser;
use std::process::ExitCode;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sight_core::{
    com::Slot,
    config::{Cli, Command, ReadConfig, ScanConfig},
    data::{Access, Object, Series, SeriesSet},
    dicom::{
        self, search_recursively, sop_class, ReadReport, SeriesScanner, SERIES_SET_READER,
    },
    jobs::{Aggregator, Observer},
    logger::{LogEntry, LogLevel, Logger},
    service::{ObjectServiceRegistry, ServiceConfig, ServiceFactory},
};

const READER_ID: &str = "series_set_reader";

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Read(config) => run_read(config),
        Command::Scan(config) => run_scan(config),
    }
}

// =============================================================================
// Read Command
// =============================================================================

fn run_read(config: ReadConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let factory = ServiceFactory::new();
    dicom::register(&factory);
    let registry = ObjectServiceRegistry::new();

    let service = match factory.create(SERIES_SET_READER, Some(READER_ID)) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to create the reader: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut service_config = ServiceConfig::new(READER_ID, SERIES_SET_READER)
        .with_object("seriesSet", dicom::service::DATA_KEY, Access::Out)
        .with_param("folder", config.folder.to_string_lossy().to_string())
        .with_param("dicomdir", config.dicomdir);
    if let Some(filter) = &config.filter {
        service_config = service_config.with_param("filter", filter.as_str());
    }
    if !config.sop_classes.is_empty() {
        service_config = service_config.with_param("sop_classes", config.sop_classes.clone());
    }

    if let Err(e) = service.configure(service_config) {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }
    if let Err(e) = registry.register_service(&service) {
        error!("Failed to register the reader: {}", e);
        return ExitCode::FAILURE;
    }

    // Progress of each read is traced at debug level.
    let on_job = Slot::new("on_job_created", |aggregator: Arc<Aggregator>| {
        let name = aggregator.name().to_string();
        aggregator.add_progress_hook(move |done, total| {
            debug!(job = %name, done, total, "progress");
        });
    });
    let report: Arc<Mutex<Option<ReadReport>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&report);
    let on_report = Slot::new("on_report", move |r: ReadReport| {
        *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(r);
    });

    let signals = service.signals();
    match (
        signals.get::<Arc<Aggregator>>(dicom::service::JOB_CREATED_SIGNAL),
        signals.get::<ReadReport>(dicom::service::REPORT_SIGNAL),
    ) {
        (Ok(job_created), Ok(report_signal)) => {
            job_created.connect(&on_job);
            report_signal.connect(&on_report);
        }
        (Err(e), _) | (_, Err(e)) => {
            error!("Reader signals unavailable: {}", e);
            return ExitCode::FAILURE;
        }
    }

    info!("Reading {}", config.folder.display());
    let outcome = service
        .start()
        .and_then(|()| service.update())
        .map(|()| registry.output(READER_ID, dicom::service::DATA_KEY));

    let series = match &outcome {
        Ok(Some(set)) => collect_series(set),
        _ => Vec::new(),
    };

    if let Err(e) = service.stop() {
        error!("Failed to stop the reader: {}", e);
    }
    if let Err(e) = registry.unregister_service(&service) {
        error!("Failed to unregister the reader: {}", e);
    }

    if let Err(e) = outcome {
        error!("Read failed: {}", e);
        return ExitCode::FAILURE;
    }

    let report = report
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .unwrap_or_default();

    if config.json {
        let document = serde_json::json!({ "report": &report, "series": &series });
        match serde_json::to_string_pretty(&document) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                error!("Failed to serialize the report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_series(&series);
        print_entries(&report.entries);
        println!(
            "{} converted, {} skipped, {} failed{}{}",
            report.converted,
            report.skipped,
            report.failed.len(),
            if report.from_dicomdir { " (DICOMDIR)" } else { "" },
            if report.canceled { " (canceled)" } else { "" },
        );
    }

    let has_critical = report.entries.iter().any(|e| e.level == LogLevel::Critical);
    if has_critical && series.is_empty() {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn collect_series(set: &Arc<Object>) -> Vec<Series> {
    let objects: Vec<Arc<Object>> = set
        .read::<SeriesSet, _>(|set| set.iter().cloned().collect())
        .unwrap_or_default();
    objects
        .iter()
        .filter_map(|object| object.read::<Series, _>(Series::clone).ok())
        .collect()
}

fn print_series(series: &[Series]) {
    for s in series {
        println!(
            "{}  {:<4} {:>5} instance(s)  {}  [{}]",
            s.instance_uid,
            s.modality,
            s.number_of_instances,
            s.description,
            sop_class::name(&s.sop_class_uid),
        );
    }
}

fn print_entries(entries: &[LogEntry]) {
    for entry in entries {
        let level = match entry.level {
            LogLevel::Information => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Critical => "CRITICAL",
        };
        println!("[{level}] {}", entry.message);
    }
}

// =============================================================================
// Scan Command
// =============================================================================

fn run_scan(config: ScanConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let logger = Logger::new();
    let files = match search_recursively(&config.folder, &Observer::new("search"), &logger) {
        Ok(files) => files,
        Err(e) => {
            error!("Search failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut scanner = SeriesScanner::new(logger.clone());
    let series = match scanner.split_files(&files, &Observer::new("split")) {
        Ok(series) => series,
        Err(e) => {
            error!("Scan failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for s in &series {
        let sop_classes: Vec<&str> = s.sop_class_uids.iter().map(|uid| sop_class::name(uid)).collect();
        println!(
            "{}  {:<4} {:>5} file(s)  {}  [{}]",
            s.instance_uid,
            s.modality,
            s.len(),
            s.description,
            sop_classes.join(", "),
        );
    }
    print_entries(&logger.entries());
    info!("{} file(s), {} series", files.len(), series.len());

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "sight_core=debug,sight_dicom=debug"
    } else {
        "sight_core=info,sight_dicom=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
