use std::path::PathBuf;

use snafu::prelude::*;

use crate::application::data::LogLevel;
use crate::cli::Cli;
use crate::config::{ConfigError, ConfigFile, MissingValueSnafu};

/// Raw startup values after merging the command line over the config file.
/// Nothing here has been validated yet.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub source: PathBuf,
    pub backup: PathBuf,
    pub log: PathBuf,
    pub interval: i64,
    pub log_level: LogLevel,
}

impl RuntimeConfig {
    pub async fn resolve(cli: Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => ConfigFile::from_path(path).await?,
            None => ConfigFile::default(),
        };
        Self::merge(cli, file)
    }

    fn merge(cli: Cli, file: ConfigFile) -> Result<Self, ConfigError> {
        Ok(Self {
            source: cli
                .source
                .or(file.source)
                .context(MissingValueSnafu { key: "source" })?,
            backup: cli
                .backup
                .or(file.backup)
                .context(MissingValueSnafu { key: "backup" })?,
            log: cli.log.or(file.log).context(MissingValueSnafu { key: "log" })?,
            interval: cli
                .interval
                .or(file.interval)
                .context(MissingValueSnafu { key: "interval" })?,
            log_level: cli.log_level,
        })
    }
}
