use std::sync::Arc;

use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, error, info};

use crate::application::RuntimeConfig;
use crate::cli::Cli;
use crate::config::ConfigError;
use crate::ext::BestEffortPathExt;
use crate::logging::{self, LoggingError};
use crate::mirror::{MirrorEngine, TracingReporter};
use crate::scheduler::{Scheduler, SchedulerError};
use crate::validation::{self, PathRole, SyncInterval, SyncPair, ValidationError, validate_interval};

pub struct Application;

impl Application {
    /// Validates the configuration, then mirrors on schedule until Ctrl-C.
    pub async fn run(cli: Cli) -> Result<(), ApplicationError> {
        let config = RuntimeConfig::resolve(cli).await.context(ConfigSnafu)?;

        // The log folder comes first so every later failure ends up in the log
        let log_dir = validation::validate(&config.log, PathRole::Log)
            .await
            .context(ValidationSnafu)?;
        if let Some(log_file) = logging::setup_tracing(config.log_level, &log_dir).context(LoggingSnafu)? {
            debug!("Logging to {}", log_file.best_effort_path_display());
        }
        debug!("Resolved configuration: {:?}", config);

        let result = Self::mirror_until_stopped(&config).await;
        if let Err(err) = &result {
            error!("{}", snafu::Report::from_error(err));
        }
        result
    }

    async fn mirror_until_stopped(config: &RuntimeConfig) -> Result<(), ApplicationError> {
        let (interval, pair) = Self::prepare(config).await?;

        let engine = MirrorEngine::new(Arc::new(TracingReporter));
        let handle = Scheduler::start(interval, engine, pair).context(SchedulerSnafu)?;
        info!("-----------Synchronization started-----------");

        let signal = compio::signal::ctrl_c().await;
        info!("Stop requested, waiting for the current pass to finish");
        let report = handle.stop().await.context(SchedulerSnafu)?;
        info!(
            passes = report.passes_completed,
            skipped_ticks = report.ticks_skipped,
            "-----------Synchronization stopped-----------"
        );

        signal.context(SignalSnafu)
    }

    /// Interval, overlap, source, backup: in that order, stopping at the first
    /// failure. Nothing is created when the interval or the overlap check fails.
    async fn prepare(config: &RuntimeConfig) -> Result<(SyncInterval, SyncPair), ApplicationError> {
        let interval = validate_interval(config.interval).context(ValidationSnafu)?;
        let pair = SyncPair::validate(&config.source, &config.backup)
            .await
            .context(ValidationSnafu)?;
        Ok((interval, pair))
    }
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ConfigError { source: ConfigError },
    #[snafu(display("Startup validation failed"))]
    ValidationError { source: ValidationError },
    #[snafu(display("Failed to set up logging"))]
    LoggingError { source: LoggingError },
    #[snafu(display("Critical failure encountered in the scheduler"))]
    SchedulerError { source: SchedulerError },
    #[snafu(display("Failed to listen for the stop signal"))]
    SignalError { source: std::io::Error },
}
