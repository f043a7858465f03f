mod config;

pub use config::{ConfigError, ConfigFile};
pub(crate) use config::MissingValueSnafu;
