use std::ffi::OsString;
use std::fs::{self, FileType};
use std::io;
use std::path::{Path, PathBuf};

use tracing::trace;

/// The kind of a filesystem node as the mirror sees it.
///
/// Symbolic links are followed only when they point at a regular file. Links
/// to directories, dangling links and special files are all `Other`: they are
/// never mirrored, and the prune pass treats them like files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: OsString,
    pub path: PathBuf,
    pub kind: NodeKind,
}

/// Direct children of one directory, sorted by name.
#[derive(Debug, Default)]
pub struct DirectoryListing {
    pub nodes: Vec<TreeNode>,
    /// Entries that could not be read, with the best path known for them.
    pub unreadable: Vec<(PathBuf, io::Error)>,
}

impl DirectoryListing {
    pub fn files(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter().filter(|node| node.kind == NodeKind::File)
    }

    pub fn directories(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes
            .iter()
            .filter(|node| node.kind == NodeKind::Directory)
    }

    pub fn others(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.iter().filter(|node| node.kind == NodeKind::Other)
    }
}

/// Lists `dir` one level deep. Failing to open the directory is an error;
/// failing on a single entry only lands that entry in `unreadable`.
pub fn list_children(dir: &Path) -> io::Result<DirectoryListing> {
    let mut listing = DirectoryListing::default();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                listing.unreadable.push((dir.to_path_buf(), err));
                continue;
            }
        };
        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) => listing.nodes.push(TreeNode {
                name: entry.file_name(),
                kind: classify(&path, file_type),
                path,
            }),
            Err(err) => listing.unreadable.push((path, err)),
        }
    }

    listing.nodes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(listing)
}

/// Looks up the kind of the node at `path` without requiring it to exist.
pub fn probe(path: &Path) -> io::Result<Option<NodeKind>> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => Ok(Some(classify(path, metadata.file_type()))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn classify(path: &Path, file_type: FileType) -> NodeKind {
    if file_type.is_dir() {
        NodeKind::Directory
    } else if file_type.is_file() {
        NodeKind::File
    } else if file_type.is_symlink() {
        match fs::metadata(path) {
            Ok(target) if target.is_file() => NodeKind::File,
            _ => {
                trace!("Not following link {}", path.display());
                NodeKind::Other
            }
        }
    } else {
        NodeKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lists_files_and_directories_sorted_by_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("b.txt"), "b").unwrap();
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("sub").join("nested.txt"), "n").unwrap();

        let listing = list_children(temp_dir.path()).unwrap();

        let files: Vec<_> = listing.files().map(|node| node.name.clone()).collect();
        let dirs: Vec<_> = listing.directories().map(|node| node.name.clone()).collect();
        assert_eq!(files, vec![OsString::from("a.txt"), OsString::from("b.txt")]);
        assert_eq!(dirs, vec![OsString::from("sub")]);
        assert!(listing.unreadable.is_empty());
    }

    #[test]
    fn listing_a_missing_directory_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");

        let result = list_children(&temp_dir.path().join("missing"));

        assert!(result.is_err());
    }

    #[test]
    fn probe_distinguishes_kinds() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert_eq!(probe(&file).unwrap(), Some(NodeKind::File));
        assert_eq!(probe(temp_dir.path()).unwrap(), Some(NodeKind::Directory));
        assert_eq!(probe(&temp_dir.path().join("absent")).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn links_are_followed_only_to_files() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let target_file = temp_dir.path().join("target.txt");
        let target_dir = temp_dir.path().join("target_dir");
        fs::write(&target_file, "x").unwrap();
        fs::create_dir(&target_dir).unwrap();
        symlink(&target_file, temp_dir.path().join("file_link")).unwrap();
        symlink(&target_dir, temp_dir.path().join("dir_link")).unwrap();
        symlink(temp_dir.path().join("nowhere"), temp_dir.path().join("dangling")).unwrap();

        assert_eq!(
            probe(&temp_dir.path().join("file_link")).unwrap(),
            Some(NodeKind::File)
        );
        assert_eq!(
            probe(&temp_dir.path().join("dir_link")).unwrap(),
            Some(NodeKind::Other)
        );
        assert_eq!(
            probe(&temp_dir.path().join("dangling")).unwrap(),
            Some(NodeKind::Other)
        );
    }
}
