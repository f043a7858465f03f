use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Instant, SystemTime};

use filetime::FileTime;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::ext::BestEffortPathExt;
use crate::filesystem::{NodeKind, list_children, probe};

use super::{CopyReason, MirrorEvent, MirrorReporter, PassSummary};

const TEMPORARY_PREFIX: &str = ".tessmirror-tmp-";

static NEXT_TEMPORARY_ID: AtomicUsize = AtomicUsize::new(0);

/// Makes a backup tree match its source tree.
///
/// A call to [`MirrorEngine::sync`] runs two full walks: the reconcile pass
/// copies files the backup is missing or holds an older version of, then the
/// prune pass removes whatever the source no longer has. Only modification
/// times decide whether a file is rewritten; equal times count as in sync.
///
/// Failures are scoped to the file or directory they happen on. They are
/// reported and the walk moves on to the next sibling.
#[derive(Clone)]
pub struct MirrorEngine {
    reporter: Arc<dyn MirrorReporter>,
}

impl MirrorEngine {
    pub fn new(reporter: Arc<dyn MirrorReporter>) -> Self {
        Self { reporter }
    }

    pub fn sync(&self, source_root: &Path, backup_root: &Path) -> PassSummary {
        let started = Instant::now();
        debug!(
            "Mirroring {} into {}",
            source_root.display(),
            backup_root.display()
        );

        let mut pass = Pass {
            reporter: self.reporter.as_ref(),
            summary: PassSummary::default(),
        };
        // The prune pass must not start before every copy has been made
        pass.reconcile(source_root, backup_root);
        pass.prune(source_root, backup_root);

        let summary = pass.summary;
        if summary.writes() == 0 && summary.failures == 0 {
            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Backup already up to date"
            );
            return summary;
        }
        info!(
            created = summary.directories_created,
            copied = summary.files_copied,
            updated = summary.files_updated,
            deleted_files = summary.files_deleted,
            deleted_dirs = summary.directories_deleted,
            failures = summary.failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Mirror pass finished"
        );
        summary
    }
}

struct Pass<'a> {
    reporter: &'a dyn MirrorReporter,
    summary: PassSummary,
}

impl Pass<'_> {
    fn emit(&mut self, event: MirrorEvent) {
        self.summary.record(&event);
        self.reporter.report(event);
    }

    fn fail(&mut self, error: MirrorItemError) {
        self.emit(MirrorEvent::ItemFailed { error });
    }

    /// Copy-forward walk of `source_dir`, pre-order, files before subdirectories.
    fn reconcile(&mut self, source_dir: &Path, backup_dir: &Path) {
        let mut listing = match list_children(source_dir) {
            Ok(listing) => listing,
            Err(err) => {
                self.fail(MirrorItemError::ListFailed {
                    path: source_dir.to_path_buf(),
                    source: err,
                });
                return;
            }
        };

        for (path, err) in std::mem::take(&mut listing.unreadable) {
            self.fail(MirrorItemError::ListFailed { path, source: err });
        }

        for file in listing.files() {
            let target = backup_dir.join(&file.name);
            match reconcile_file(&file.path, &target) {
                Ok(Some(reason)) => self.emit(MirrorEvent::FileCopied {
                    source: file.path.clone(),
                    target,
                    reason,
                }),
                Ok(None) => {}
                Err(err) => self.fail(err),
            }
        }

        for other in listing.others() {
            debug!("Skipping {}", other.path.display());
        }

        for dir in listing.directories() {
            let target = backup_dir.join(&dir.name);
            match ensure_directory(&target) {
                Ok(true) => self.emit(MirrorEvent::DirectoryCreated {
                    path: target.clone(),
                }),
                Ok(false) => {}
                Err(err) => {
                    self.fail(MirrorItemError::CreateFailed {
                        path: target,
                        source: err,
                    });
                    continue;
                }
            }
            self.reconcile(&dir.path, &target);
        }
    }

    /// Deletion walk of `backup_dir`, pre-order. A backup directory whose
    /// source counterpart exists is always kept, even when it ends up empty.
    fn prune(&mut self, source_dir: &Path, backup_dir: &Path) {
        let mut listing = match list_children(backup_dir) {
            Ok(listing) => listing,
            Err(err) => {
                self.fail(MirrorItemError::ListFailed {
                    path: backup_dir.to_path_buf(),
                    source: err,
                });
                return;
            }
        };

        for (path, err) in std::mem::take(&mut listing.unreadable) {
            self.fail(MirrorItemError::ListFailed { path, source: err });
        }

        for node in listing.files().chain(listing.others()) {
            let counterpart = source_dir.join(&node.name);
            match probe(&counterpart) {
                Ok(Some(NodeKind::File)) => {}
                Ok(_) => match fs::remove_file(&node.path) {
                    Ok(()) => self.emit(MirrorEvent::FileDeleted {
                        path: node.path.clone(),
                    }),
                    Err(err) => self.fail(MirrorItemError::DeleteFailed {
                        path: node.path.clone(),
                        source: err,
                    }),
                },
                // Unknown state on the source side, keep the backup copy
                Err(err) => self.fail(MirrorItemError::ListFailed {
                    path: counterpart,
                    source: err,
                }),
            }
        }

        for dir in listing.directories() {
            let counterpart = source_dir.join(&dir.name);
            match probe(&counterpart) {
                Ok(Some(NodeKind::Directory)) => self.prune(&counterpart, &dir.path),
                Ok(_) => match fs::remove_dir_all(&dir.path) {
                    Ok(()) => self.emit(MirrorEvent::DirectoryDeleted {
                        path: dir.path.clone(),
                    }),
                    Err(err) => self.fail(MirrorItemError::DeleteFailed {
                        path: dir.path.clone(),
                        source: err,
                    }),
                },
                Err(err) => self.fail(MirrorItemError::ListFailed {
                    path: counterpart,
                    source: err,
                }),
            }
        }
    }
}

/// Brings one file up to date. Returns why it was copied, or `None` when the
/// target was already current.
fn reconcile_file(source: &Path, target: &Path) -> Result<Option<CopyReason>, MirrorItemError> {
    let copy_context = || CopyFailedSnafu {
        source_path: source,
        target_path: target,
    };

    let source_modified = fs::metadata(source)
        .and_then(|metadata| metadata.modified())
        .with_context(|_| copy_context())?;

    let reason = match fs::metadata(target) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => CopyReason::New,
        Err(err) => return Err(err).with_context(|_| copy_context()),
        Ok(metadata) if metadata.is_dir() => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "a directory occupies the target path",
            ))
            .with_context(|_| copy_context());
        }
        Ok(metadata) => {
            let target_modified = metadata.modified().with_context(|_| copy_context())?;
            if source_modified <= target_modified {
                return Ok(None);
            }
            CopyReason::Newer
        }
    };

    copy_file(source, target, source_modified).with_context(|_| copy_context())?;
    Ok(Some(reason))
}

/// Writes `source` to a hidden sibling of `target`, stamps the source's
/// modification time on it and renames it into place. An interrupted copy
/// leaves only the sibling behind, which the next prune pass removes.
fn copy_file(source: &Path, target: &Path, modified: SystemTime) -> io::Result<()> {
    let temporary = unused_temporary_path(target)?;
    let attempt = || -> io::Result<()> {
        fs::copy(source, &temporary)?;
        filetime::set_file_mtime(&temporary, FileTime::from_system_time(modified))?;
        fs::rename(&temporary, target)
    };

    let result = attempt();
    if result.is_err()
        && let Err(err) = fs::remove_file(&temporary)
        && err.kind() != io::ErrorKind::NotFound
    {
        debug!("Could not remove {}: {}", temporary.display(), err);
    }
    result
}

/// A sibling name nothing in the backup currently uses. Mirrored source files
/// may themselves start with the prefix, so existing names are skipped.
fn unused_temporary_path(target: &Path) -> io::Result<PathBuf> {
    loop {
        let unique = NEXT_TEMPORARY_ID.fetch_add(1, Ordering::Relaxed);
        let candidate = temporary_path(target, unique);
        match fs::symlink_metadata(&candidate) {
            Ok(_) => continue,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(candidate),
            Err(err) => return Err(err),
        }
    }
}

fn temporary_path(target: &Path, unique: usize) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "file".to_string());
    target.with_file_name(format!(
        "{TEMPORARY_PREFIX}{file_name}-{}-{unique}",
        process::id()
    ))
}

/// Returns whether the directory had to be created.
fn ensure_directory(path: &Path) -> io::Result<bool> {
    if path.is_dir() {
        return Ok(false);
    }
    fs::create_dir(path)?;
    Ok(true)
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum MirrorItemError {
    #[snafu(display(
        "Failed to copy {} to {}",
        source_path.best_effort_path_display(),
        target_path.best_effort_path_display()
    ))]
    CopyFailed {
        source_path: PathBuf,
        target_path: PathBuf,
        source: io::Error,
    },
    #[snafu(display("Failed to delete {}", path.best_effort_path_display()))]
    DeleteFailed { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to create folder {}", path.best_effort_path_display()))]
    CreateFailed { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to read {}", path.best_effort_path_display()))]
    ListFailed { path: PathBuf, source: io::Error },
}

impl MirrorItemError {
    pub fn kind(&self) -> &'static str {
        match self {
            MirrorItemError::CopyFailed { .. } => "copy",
            MirrorItemError::DeleteFailed { .. } => "delete",
            MirrorItemError::CreateFailed { .. } => "create",
            MirrorItemError::ListFailed { .. } => "list",
        }
    }

    /// The backup-side path for copies, the affected path otherwise.
    pub fn path(&self) -> &Path {
        match self {
            MirrorItemError::CopyFailed { target_path, .. } => target_path,
            MirrorItemError::DeleteFailed { path, .. }
            | MirrorItemError::CreateFailed { path, .. }
            | MirrorItemError::ListFailed { path, .. } => path,
        }
    }
}
