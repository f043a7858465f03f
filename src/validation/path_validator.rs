use std::io;
use std::path::{Path, PathBuf};

use derive_more::Display;
use snafu::prelude::*;
use tracing::info;

use crate::ext::{BestEffortPathExt, absolute_normalized, absolute_normalized_from};

/// What a validated directory is going to be used for. Only affects messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PathRole {
    #[display("source")]
    Source,
    #[display("backup")]
    Backup,
    #[display("log")]
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Overlap {
    #[display("the same")]
    Same,
    #[display("nested within each other")]
    Nested,
}

/// Source and backup roots that passed validation. Both are absolute and
/// neither contains the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPair {
    source: PathBuf,
    backup: PathBuf,
}

impl SyncPair {
    /// Checks that the roots are disjoint before creating either of them, so an
    /// overlapping configuration leaves the filesystem untouched.
    pub async fn validate(
        source: impl AsRef<Path>,
        backup: impl AsRef<Path>,
    ) -> Result<Self, ValidationError> {
        check_disjoint(source.as_ref(), backup.as_ref())?;
        let source = validate(source, PathRole::Source).await?;
        let backup = validate(backup, PathRole::Backup).await?;
        Ok(Self { source, backup })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }
}

/// Resolves `path` to its canonical absolute form and makes sure a directory
/// exists there, creating it together with any missing ancestors.
pub async fn validate(path: impl AsRef<Path>, role: PathRole) -> Result<PathBuf, ValidationError> {
    let path = path.as_ref();
    let canonical = canonical_form(path, role, std::env::current_dir)?;

    ensure!(
        !has_illegal_characters(&canonical),
        InvalidPathSnafu { role, path }
    );

    match compio::fs::metadata(&canonical).await {
        Ok(metadata) if metadata.is_dir() => return Ok(canonical),
        Ok(_) => {
            return Err(ValidationError::IoFailure {
                role,
                path: path.to_path_buf(),
                source: io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "a non-directory entry already exists at this path",
                ),
            });
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(creation_failure(err, role, path)),
    }

    compio::fs::create_dir_all(&canonical)
        .await
        .map_err(|err| creation_failure(err, role, path))?;
    info!(%role, path = %canonical.display(), "Created {role} directory");

    Ok(canonical)
}

/// Fails when the two roots are the same directory or one lies inside the
/// other. Mirroring in either situation would walk its own output.
pub fn check_disjoint(source: &Path, backup: &Path) -> Result<(), ValidationError> {
    let source_canonical = absolute_normalized(source).context(UnexpectedFailureSnafu {
        role: PathRole::Source,
        path: source,
    })?;
    let backup_canonical = absolute_normalized(backup).context(UnexpectedFailureSnafu {
        role: PathRole::Backup,
        path: backup,
    })?;

    let left = comparable_form(&source_canonical);
    let right = comparable_form(&backup_canonical);

    ensure!(
        left != right,
        OverlappingPathsSnafu {
            source_root: &source_canonical,
            backup_root: &backup_canonical,
            overlap: Overlap::Same,
        }
    );
    // `Path::starts_with` compares whole components, so `/a` does not contain `/ab`
    ensure!(
        !left.starts_with(&right) && !right.starts_with(&left),
        OverlappingPathsSnafu {
            source_root: &source_canonical,
            backup_root: &backup_canonical,
            overlap: Overlap::Nested,
        }
    );

    Ok(())
}

fn canonical_form(
    path: &Path,
    role: PathRole,
    current_dir: impl FnOnce() -> io::Result<PathBuf>,
) -> Result<PathBuf, ValidationError> {
    absolute_normalized_from(path, current_dir).context(UnexpectedFailureSnafu { role, path })
}

fn creation_failure(err: io::Error, role: PathRole, path: &Path) -> ValidationError {
    let path = path.to_path_buf();
    match err.kind() {
        io::ErrorKind::PermissionDenied => ValidationError::AccessDenied {
            role,
            path,
            source: err,
        },
        _ => ValidationError::IoFailure {
            role,
            path,
            source: err,
        },
    }
}

fn has_illegal_characters(path: &Path) -> bool {
    path.as_os_str().as_encoded_bytes().contains(&0) || has_reserved_characters(path)
}

// The drive prefix is skipped, so `C:` itself is fine
#[cfg(windows)]
fn has_reserved_characters(path: &Path) -> bool {
    use std::path::Component;

    path.components().any(|component| match component {
        Component::Normal(name) => name
            .to_string_lossy()
            .chars()
            .any(|c| c.is_control() || matches!(c, '<' | '>' | '"' | '|' | '?' | '*' | ':')),
        _ => false,
    })
}

#[cfg(not(windows))]
fn has_reserved_characters(_path: &Path) -> bool {
    false
}

#[cfg(any(windows, target_os = "macos"))]
fn comparable_form(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase())
}

#[cfg(not(any(windows, target_os = "macos")))]
fn comparable_form(path: &Path) -> PathBuf {
    path.to_path_buf()
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ValidationError {
    #[snafu(display("Invalid {role} path: {}", path.display()))]
    InvalidPath { role: PathRole, path: PathBuf },
    #[snafu(display("Access denied to {role} path: {}", path.best_effort_path_display()))]
    AccessDenied {
        role: PathRole,
        path: PathBuf,
        source: io::Error,
    },
    #[snafu(display("Failed to validate {role} path '{}'", path.best_effort_path_display()))]
    IoFailure {
        role: PathRole,
        path: PathBuf,
        source: io::Error,
    },
    #[snafu(display(
        "Unexpected error while validating {role} path '{}'",
        path.display()
    ))]
    UnexpectedFailure {
        role: PathRole,
        path: PathBuf,
        source: io::Error,
    },
    #[snafu(display(
        "Source and backup paths cannot be {overlap}: '{}' and '{}'",
        source_root.display(),
        backup_root.display()
    ))]
    OverlappingPaths {
        source_root: PathBuf,
        backup_root: PathBuf,
        overlap: Overlap,
    },
    #[snafu(display("Interval must be a positive integer, got {value}"))]
    InvalidInterval { value: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[compio::test]
    async fn validate_creates_missing_directory_with_ancestors() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("backup").join("nested").join("deeper");
        assert!(!path.exists());

        let canonical = validate(&path, PathRole::Backup).await.unwrap();

        assert!(path.is_dir());
        assert_eq!(canonical, absolute_normalized(&path).unwrap());
    }

    #[rstest]
    #[case(PathRole::Source)]
    #[case(PathRole::Backup)]
    #[case(PathRole::Log)]
    #[compio::test]
    async fn validate_accepts_existing_directory(#[case] role: PathRole) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let canonical = validate(temp_dir.path(), role).await;

        assert!(canonical.is_ok());
        assert!(canonical.unwrap().is_absolute());
    }

    #[compio::test]
    async fn validate_resolves_relative_components() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dotted = temp_dir.path().join("a").join("..").join("b").join(".");

        let canonical = validate(&dotted, PathRole::Source).await.unwrap();

        assert_eq!(canonical, temp_dir.path().join("b"));
        assert!(temp_dir.path().join("b").is_dir());
        assert!(!temp_dir.path().join("a").exists());
    }

    #[compio::test]
    async fn validate_reports_io_failure_when_path_is_a_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file_path = temp_dir.path().join("BackupAsFile.txt");
        std::fs::write(&file_path, "dummy").unwrap();

        let result = validate(&file_path, PathRole::Backup).await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ValidationError::IoFailure {
                role: PathRole::Backup,
                ..
            }
        ));
        assert!(err.to_string().contains("Failed to validate backup path"));
    }

    #[compio::test]
    async fn validate_reports_io_failure_when_ancestor_is_a_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file_path = temp_dir.path().join("blocker");
        std::fs::write(&file_path, "dummy").unwrap();

        let result = validate(file_path.join("child"), PathRole::Log).await;

        assert!(matches!(result, Err(ValidationError::IoFailure { .. })));
    }

    #[rstest]
    #[case::permission(io::ErrorKind::PermissionDenied, "AccessDenied")]
    #[case::existing_entry(io::ErrorKind::AlreadyExists, "IoFailure")]
    #[case::not_a_directory(io::ErrorKind::NotADirectory, "IoFailure")]
    #[case::disk_full(io::ErrorKind::StorageFull, "IoFailure")]
    fn creation_failure_separates_permission_errors(
        #[case] kind: io::ErrorKind,
        #[case] expected: &str,
    ) {
        let error = creation_failure(io::Error::from(kind), PathRole::Backup, Path::new("/backup"));

        let variant = match &error {
            ValidationError::AccessDenied { .. } => "AccessDenied",
            ValidationError::IoFailure { .. } => "IoFailure",
            _ => "other",
        };
        assert_eq!(variant, expected);
    }

    #[test]
    fn unreadable_working_directory_is_an_unexpected_failure() {
        let result = canonical_form(Path::new("relative/backup"), PathRole::Backup, || {
            Err(io::Error::from(io::ErrorKind::NotFound))
        });

        assert!(matches!(
            result,
            Err(ValidationError::UnexpectedFailure {
                role: PathRole::Backup,
                ..
            })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn absolute_paths_never_consult_the_working_directory() {
        let result = canonical_form(Path::new("/data/./backup/../mirror"), PathRole::Backup, || {
            Err(io::Error::from(io::ErrorKind::NotFound))
        });

        assert_eq!(result.unwrap(), PathBuf::from("/data/mirror"));
    }

    #[compio::test]
    async fn validate_rejects_nul_characters() {
        let result = validate("/tmp/bad\0name", PathRole::Source).await;

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidPath {
                role: PathRole::Source,
                ..
            }
        ));
        assert!(err.to_string().contains("Invalid source path"));
    }

    #[test]
    fn check_disjoint_rejects_identical_paths() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let result = check_disjoint(temp_dir.path(), temp_dir.path());

        assert!(matches!(
            result,
            Err(ValidationError::OverlappingPaths {
                overlap: Overlap::Same,
                ..
            })
        ));
    }

    #[test]
    fn check_disjoint_rejects_paths_equal_after_normalization() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let roundabout = temp_dir.path().join("x").join("..");

        let result = check_disjoint(temp_dir.path(), &roundabout);

        assert!(matches!(
            result,
            Err(ValidationError::OverlappingPaths {
                overlap: Overlap::Same,
                ..
            })
        ));
    }

    #[rstest]
    #[case::backup_inside_source("source", "source/nested_backup")]
    #[case::source_inside_backup("backup/nested_source", "backup")]
    #[case::deeply_nested("root", "root/a/b/c")]
    fn check_disjoint_rejects_nested_paths(#[case] source: &str, #[case] backup: &str) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let result = check_disjoint(&temp_dir.path().join(source), &temp_dir.path().join(backup));

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            ValidationError::OverlappingPaths {
                overlap: Overlap::Nested,
                ..
            }
        ));
        assert!(err.to_string().contains("nested within each other"));
    }

    #[rstest]
    #[case::siblings("source_a", "backup_b")]
    #[case::shared_name_prefix("data", "data_backup")]
    #[case::cousins("one/source", "two/backup")]
    fn check_disjoint_accepts_unrelated_paths(#[case] source: &str, #[case] backup: &str) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let result = check_disjoint(&temp_dir.path().join(source), &temp_dir.path().join(backup));

        assert!(result.is_ok());
    }

    #[compio::test]
    async fn sync_pair_rejects_overlap_without_creating_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("source");
        let backup = source.join("backup");

        let result = SyncPair::validate(&source, &backup).await;

        assert!(matches!(
            result,
            Err(ValidationError::OverlappingPaths { .. })
        ));
        assert!(!source.exists());
    }

    #[compio::test]
    async fn sync_pair_creates_both_roots() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let source = temp_dir.path().join("source");
        let backup = temp_dir.path().join("backup");

        let pair = SyncPair::validate(&source, &backup).await.unwrap();

        assert_eq!(pair.source(), source.as_path());
        assert_eq!(pair.backup(), backup.as_path());
        assert!(source.is_dir());
        assert!(backup.is_dir());
    }
}
