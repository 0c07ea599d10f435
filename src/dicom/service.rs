//! Reader service publishing a series set.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use super::filter;
use super::reader::{ReadReport, ReaderOptions, SeriesSetReader};
use crate::com::{Signal, Signals};
use crate::data::{access, HasData, Object, Ptr, SeriesSet};
use crate::error::ServiceError;
use crate::jobs::Aggregator;
use crate::service::{
    NotificationType, Service, ServiceConfig, ServiceContext, ServiceFactory,
};

/// Implementation name of [`SeriesSetReaderService`].
pub const SERIES_SET_READER: &str = "sight::io::dicom::series_set_reader";

/// Emitted with the job aggregator of each read, before it runs.
pub const JOB_CREATED_SIGNAL: &str = "job_created";

/// Emitted with the report of each completed read.
pub const REPORT_SIGNAL: &str = "report";

/// Output key of the series set.
pub const DATA_KEY: &str = "data";

fn register_signal<A: Clone + Send + 'static>(signals: &Signals, key: &str) -> Arc<Signal<A>> {
    let signal = Signal::<A>::new(key);
    if let Err(e) = signals.insert(key, Arc::clone(&signal)) {
        warn!(signal = key, error = %e, "reader signal not registered");
    }
    signal
}

/// Reads a DICOM folder on update and publishes the series set on `data`.
///
/// Parameters:
/// - `folder`: folder to read
/// - `dicomdir`: look for a DICOMDIR first (default `false`)
/// - `filter`: filter name applied before conversion
/// - `sop_classes`: SOP class allow-list
pub struct SeriesSetReaderService {
    data: Ptr<SeriesSet, access::Out>,
    folder: Option<PathBuf>,
    options: ReaderOptions,
    job_created: Arc<Signal<Arc<Aggregator>>>,
    report: Arc<Signal<ReadReport>>,
}

impl SeriesSetReaderService {
    pub fn new(data: &HasData, signals: &Signals) -> Self {
        Self {
            data: Ptr::new(data, DATA_KEY, true),
            folder: None,
            options: ReaderOptions::default(),
            job_created: register_signal(signals, JOB_CREATED_SIGNAL),
            report: register_signal(signals, REPORT_SIGNAL),
        }
    }
}

impl Service for SeriesSetReaderService {
    fn configuring(
        &mut self,
        _ctx: &ServiceContext<'_>,
        config: &ServiceConfig,
    ) -> Result<(), ServiceError> {
        self.folder = config.param_str("folder").map(PathBuf::from);

        let filter = config.param_str("filter").map(str::to_string);
        if let Some(name) = &filter {
            filter::create(name).map_err(|e| ServiceError::Configuration(e.to_string()))?;
        }

        self.options = ReaderOptions {
            dicomdir: config.param_bool("dicomdir", false)?,
            filter,
            sop_classes: config.param_str_list("sop_classes"),
        };
        Ok(())
    }

    fn starting(&mut self, _ctx: &ServiceContext<'_>) -> Result<(), ServiceError> {
        Ok(())
    }

    fn updating(&mut self, ctx: &ServiceContext<'_>) -> Result<(), ServiceError> {
        let folder = self.folder.clone().ok_or_else(|| {
            ServiceError::Configuration(format!("service {} has no folder to read", ctx.id()))
        })?;

        let reader = SeriesSetReader::new(&folder, self.options.clone());
        self.job_created.emit(Arc::clone(reader.aggregator()));

        let series_set = Object::new(SeriesSet::new());
        let report = match reader.read(&series_set) {
            Ok(report) => report,
            Err(e) => {
                ctx.notify(NotificationType::Failure, e.to_string());
                return Err(ServiceError::Failed {
                    service: ctx.id().to_string(),
                    message: e.to_string(),
                });
            }
        };

        if report.converted > 0 {
            let (auto_connect, optional) = (self.data.auto_connect(), self.data.is_optional());
            self.data
                .set(Some(series_set), auto_connect, optional, true)?;
            ctx.notify(
                NotificationType::Success,
                format!("{} series read from {}", report.converted, folder.display()),
            );
        } else {
            ctx.notify(
                NotificationType::Failure,
                format!("No series could be read from {}", folder.display()),
            );
        }
        info!(service = ctx.id(), converted = report.converted, "series set read");
        self.report.emit(report);
        Ok(())
    }

    fn info(&self) -> String {
        match &self.folder {
            Some(folder) => format!("reading {}", folder.display()),
            None => "no folder".to_string(),
        }
    }
}

/// Register the reader in `factory`.
pub fn register(factory: &ServiceFactory) {
    factory.register(SERIES_SET_READER, |data, signals| {
        Box::new(SeriesSetReaderService::new(data, signals))
    });
}
