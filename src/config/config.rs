use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::{debug, warn};

use crate::ext::BestEffortPathExt;

const SOURCE_KEY: &str = "source";
const BACKUP_KEY: &str = "backup";
const LOG_KEY: &str = "log";
const INTERVAL_KEY: &str = "interval";
const KNOWN_KEYS: [&str; 4] = [SOURCE_KEY, BACKUP_KEY, LOG_KEY, INTERVAL_KEY];

/// Values read from a YAML config file. Every key is optional; whatever is
/// missing has to come from the command line.
///
/// ```yaml
/// source: /data/projects
/// backup: /mnt/backup/projects
/// log: /var/log/tessmirror
/// interval: 300
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub source: Option<PathBuf>,
    pub backup: Option<PathBuf>,
    pub log: Option<PathBuf>,
    pub interval: Option<i64>,
}

impl ConfigFile {
    pub async fn from_path(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading config file: {}", path.best_effort_path_display());
        let bytes = compio::fs::read(path).await.context(ReadSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.best_effort_path_display(),
        })?;
        debug!("Successfully read config file: {} bytes", contents.len());

        contents.as_str().try_into()
    }

    fn path_value(
        top_level: &LinkedHashMap<Yaml, Yaml>,
        key: &'static str,
    ) -> Result<Option<PathBuf>, ConfigError> {
        match lookup(top_level, key) {
            None | Some(Yaml::Value(Scalar::Null)) => Ok(None),
            Some(Yaml::Value(Scalar::String(value))) => Ok(Some(PathBuf::from(value.to_string()))),
            Some(_) => InvalidValueSnafu {
                key,
                expected: "a path",
            }
            .fail(),
        }
    }

    fn integer_value(
        top_level: &LinkedHashMap<Yaml, Yaml>,
        key: &'static str,
    ) -> Result<Option<i64>, ConfigError> {
        match lookup(top_level, key) {
            None | Some(Yaml::Value(Scalar::Null)) => Ok(None),
            Some(Yaml::Value(Scalar::Integer(value))) => Ok(Some(*value)),
            Some(_) => InvalidValueSnafu {
                key,
                expected: "an integer",
            }
            .fail(),
        }
    }
}

fn lookup<'a, 'input>(
    top_level: &'a LinkedHashMap<Yaml<'input>, Yaml<'input>>,
    key: &'static str,
) -> Option<&'a Yaml<'input>> {
    top_level.get(&Yaml::Value(Scalar::String(Cow::Borrowed(key))))
}

impl TryFrom<&str> for ConfigFile {
    type Error = ConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents.first().context(MalformedConfigSnafu)?;
        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;

        for key in top_level.keys() {
            match key {
                Yaml::Value(Scalar::String(name)) if KNOWN_KEYS.contains(&name.as_ref()) => {}
                _ => warn!("Ignoring unknown config entry: {:?}", key),
            }
        }

        Ok(ConfigFile {
            source: Self::path_value(top_level, SOURCE_KEY)?,
            backup: Self::path_value(top_level, BACKUP_KEY)?,
            log: Self::path_value(top_level, LOG_KEY)?,
            interval: Self::integer_value(top_level, INTERVAL_KEY)?,
        })
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("The config file is not valid UTF-8: {}", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted config file"))]
    MalformedConfig,
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Config entry '{}' should be {}", key, expected))]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
    },
    #[snafu(display(
        "No {} given: pass --{} or set '{}' in the config file",
        key,
        key,
        key
    ))]
    MissingValue { key: &'static str },
}
