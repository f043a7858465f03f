use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolves `path` to an absolute, lexically normalized form without touching
/// the filesystem. The path does not have to exist.
pub fn absolute_normalized(path: &Path) -> io::Result<PathBuf> {
    absolute_normalized_from(path, std::env::current_dir)
}

/// Like [`absolute_normalized`], resolving relative paths against whatever
/// `current_dir` returns. It is only called for relative paths.
pub fn absolute_normalized_from(
    path: &Path,
    current_dir: impl FnOnce() -> io::Result<PathBuf>,
) -> io::Result<PathBuf> {
    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        current_dir()?.join(path)
    };
    Ok(normalize_path(&absolute_path))
}

pub fn best_effort_path_display(path: &Path) -> String {
    match path.canonicalize() {
        Ok(canonical_path) => canonical_path.display().to_string(),
        Err(_) => match absolute_normalized(path) {
            Ok(normalized) => normalized.display().to_string(),
            Err(_) => normalize_path(path).display().to_string(),
        },
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` never climbs above the root or a drive prefix
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            _ => {
                components.push(component);
            }
        }
    }

    components.iter().collect()
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }
}

impl BestEffortPathExt for PathBuf {
    fn best_effort_path_display(&self) -> String {
        best_effort_path_display(self)
    }
}
