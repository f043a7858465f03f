use std::time::Duration;

use snafu::OptionExt;

use super::path_validator::{InvalidIntervalSnafu, ValidationError};

/// Time between two mirror passes. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncInterval(Duration);

impl SyncInterval {
    pub fn from_secs(seconds: i64) -> Result<Self, ValidationError> {
        u64::try_from(seconds)
            .ok()
            .map(Duration::from_secs)
            .and_then(Self::from_duration)
            .context(InvalidIntervalSnafu { value: seconds })
    }

    /// Sub-second periods are only reachable from code; the command line
    /// always goes through [`SyncInterval::from_secs`].
    pub fn from_duration(period: Duration) -> Option<Self> {
        (!period.is_zero()).then_some(Self(period))
    }

    pub fn period(&self) -> Duration {
        self.0
    }
}

impl TryFrom<i64> for SyncInterval {
    type Error = ValidationError;

    fn try_from(seconds: i64) -> Result<Self, Self::Error> {
        Self::from_secs(seconds)
    }
}

pub fn validate_interval(seconds: i64) -> Result<SyncInterval, ValidationError> {
    seconds.try_into()
}
