//! One-level directory listings used by the mirror passes.
//!
//! Nothing here is cached: every pass lists the trees again, so the model is
//! always the filesystem as it is right now.

mod tree;

pub use tree::{DirectoryListing, NodeKind, TreeNode, list_children, probe};
