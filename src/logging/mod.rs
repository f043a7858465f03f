//! Process-wide log sinks: the console and one file per run in the log folder.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use snafu::{ResultExt, Snafu};
use supports_color::Stream;
use time::OffsetDateTime;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, util::TryInitError};

use crate::application::data::LogLevel;
use crate::ext::BestEffortPathExt;

/// Installs the global subscriber. Returns the file being written, or `None`
/// when logging is silenced.
pub fn setup_tracing(level: LogLevel, log_dir: &Path) -> Result<Option<PathBuf>, LoggingError> {
    let filter = LevelFilter::from(level);
    if filter == LevelFilter::OFF {
        return Ok(None);
    }

    // Local time is unavailable in some multi-threaded contexts
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let log_file_path = log_dir.join(log_file_name(now));
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .context(OpenLogFileSnafu {
            file_path: log_file_path.best_effort_path_display(),
        })?;

    let console_layer = fmt::layer()
        .compact()
        .with_ansi(supports_color::on(Stream::Stdout).is_some())
        .with_filter(filter);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context(InstallSnafu)?;

    Ok(Some(log_file_path))
}

/// `log_<yyyyMMdd_HHmm>.txt`
pub fn log_file_name(at: OffsetDateTime) -> String {
    format!(
        "log_{:04}{:02}{:02}_{:02}{:02}.txt",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute()
    )
}

#[derive(Debug, Snafu)]
pub enum LoggingError {
    #[snafu(display("Failed to open the log file: {}", file_path))]
    OpenLogFileError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to install the log subscriber"))]
    InstallError { source: TryInitError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Month};

    #[test]
    fn log_file_name_is_zero_padded() {
        let at = Date::from_calendar_date(2024, Month::March, 5)
            .unwrap()
            .with_hms(7, 9, 0)
            .unwrap()
            .assume_utc();

        assert_eq!(log_file_name(at), "log_20240305_0709.txt");
    }

    #[test]
    fn silent_level_installs_nothing() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");

        let result = setup_tracing(LogLevel::Silent, temp_dir.path()).unwrap();

        assert!(result.is_none());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_log_folder_is_reported() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp directory");

        let result = setup_tracing(LogLevel::Info, &temp_dir.path().join("missing"));

        assert!(matches!(result, Err(LoggingError::OpenLogFileError { .. })));
    }
}
