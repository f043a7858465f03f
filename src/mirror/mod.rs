//! One-way mirroring of a source tree onto a backup tree.

mod engine;
mod report;

pub use engine::{MirrorEngine, MirrorItemError};
pub use report::{CopyReason, MirrorEvent, MirrorReporter, PassSummary, TracingReporter};

#[cfg(test)]
pub(crate) use report::testing;
