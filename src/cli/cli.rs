use std::path::PathBuf;

use clap::Parser;

use crate::application::data::LogLevel;

/// Periodically mirror a source folder into a backup folder.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Path to the source folder
    #[clap(long, short)]
    pub source: Option<PathBuf>,

    /// Path to the backup folder
    #[clap(long, short)]
    pub backup: Option<PathBuf>,

    /// Interval between synchronizations, in seconds
    #[clap(long, short, allow_negative_numbers = true)]
    pub interval: Option<i64>,

    /// Folder the log file is written to
    #[clap(long, short)]
    pub log: Option<PathBuf>,

    /// YAML file providing any of the values above; flags take precedence
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    #[clap(long, default_value = "info", value_enum)]
    pub log_level: LogLevel,
}
