use std::path::PathBuf;

use derive_more::Display;
use tracing::{error, info};

use super::MirrorItemError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CopyReason {
    /// Nothing existed at the target path.
    #[display("new")]
    New,
    /// The source file was modified after the target.
    #[display("newer")]
    Newer,
}

/// Everything a mirror pass does to the backup tree, plus the items it had to
/// skip.
#[derive(Debug)]
pub enum MirrorEvent {
    DirectoryCreated {
        path: PathBuf,
    },
    FileCopied {
        source: PathBuf,
        target: PathBuf,
        reason: CopyReason,
    },
    /// Removed because the source has no file at the same relative path.
    FileDeleted {
        path: PathBuf,
    },
    /// Removed with all its contents because the source has no such directory.
    DirectoryDeleted {
        path: PathBuf,
    },
    ItemFailed {
        error: MirrorItemError,
    },
}

/// Receives mirror events. Injected into the engine instead of a global sink.
pub trait MirrorReporter: Send + Sync {
    fn report(&self, event: MirrorEvent);
}

/// Forwards every event to `tracing` as a structured record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl MirrorReporter for TracingReporter {
    fn report(&self, event: MirrorEvent) {
        match event {
            MirrorEvent::DirectoryCreated { path } => {
                info!(path = %path.display(), "Created folder");
            }
            MirrorEvent::FileCopied {
                source,
                target,
                reason: CopyReason::New,
            } => {
                info!(
                    source = %source.display(),
                    target = %target.display(),
                    reason = %CopyReason::New,
                    "Copied new file"
                );
            }
            MirrorEvent::FileCopied {
                source,
                target,
                reason: CopyReason::Newer,
            } => {
                info!(
                    source = %source.display(),
                    target = %target.display(),
                    reason = %CopyReason::Newer,
                    "Updated file (newer source version found)"
                );
            }
            MirrorEvent::FileDeleted { path } => {
                info!(path = %path.display(), reason = "orphan", "Deleted file (no longer in source)");
            }
            MirrorEvent::DirectoryDeleted { path } => {
                info!(path = %path.display(), reason = "orphan", "Deleted folder (no longer in source)");
            }
            MirrorEvent::ItemFailed { error } => {
                error!(
                    kind = error.kind(),
                    path = %error.path().display(),
                    error = &error as &(dyn std::error::Error + 'static),
                    "Skipped item"
                );
            }
        }
    }
}

/// Counts of what one pass did. Writes are everything except `failures`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub directories_created: usize,
    pub files_copied: usize,
    pub files_updated: usize,
    pub files_deleted: usize,
    pub directories_deleted: usize,
    pub failures: usize,
}

impl PassSummary {
    pub fn writes(&self) -> usize {
        self.directories_created
            + self.files_copied
            + self.files_updated
            + self.files_deleted
            + self.directories_deleted
    }

    pub(crate) fn record(&mut self, event: &MirrorEvent) {
        match event {
            MirrorEvent::DirectoryCreated { .. } => self.directories_created += 1,
            MirrorEvent::FileCopied {
                reason: CopyReason::New,
                ..
            } => self.files_copied += 1,
            MirrorEvent::FileCopied {
                reason: CopyReason::Newer,
                ..
            } => self.files_updated += 1,
            MirrorEvent::FileDeleted { .. } => self.files_deleted += 1,
            MirrorEvent::DirectoryDeleted { .. } => self.directories_deleted += 1,
            MirrorEvent::ItemFailed { .. } => self.failures += 1,
        }
    }
}
