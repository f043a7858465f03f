use clap::ValueEnum;
use tracing_subscriber::filter::LevelFilter;

/// Verbosity shared by the console and the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    /// Everything, including entries that needed no work
    Debug,
    /// Copies, deletions and pass summaries
    #[default]
    Info,
    Warn,
    /// Only items that could not be mirrored and fatal errors
    Error,
    /// No console output and no log file
    #[value(alias = "off")]
    Silent,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Silent => LevelFilter::OFF,
        }
    }
}
