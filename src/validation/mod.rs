//! Startup checks that turn raw configuration into values the mirror can
//! trust for the rest of the process: directory roots that exist and do not
//! overlap, and a positive sync interval.

mod interval;
mod path_validator;

pub use interval::{SyncInterval, validate_interval};
pub use path_validator::{
    Overlap, PathRole, SyncPair, ValidationError, check_disjoint, validate,
};
