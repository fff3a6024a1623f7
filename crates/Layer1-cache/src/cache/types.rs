//! Value types stored by the search and tree tiers

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::fs::normalize_key;
use super::hash::search_fingerprint;

/// One match produced by the search engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// 1-based column of the match start
    pub column: usize,
    /// The matching line, trimmed of its line terminator
    pub text: String,
}

impl SearchResult {
    pub fn new(path: impl Into<PathBuf>, line: usize, column: usize, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            column,
            text: text.into(),
        }
    }
}

/// Key of the search tier.
///
/// The project is kept next to the fingerprint so results can be
/// invalidated per project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub project: PathBuf,
    pub fingerprint: u64,
}

impl SearchKey {
    /// `project` is made absolute so relative and absolute spellings share
    /// one entry.
    pub fn new(project: &Path, query: &str) -> Self {
        let project = normalize_key(project);
        Self {
            fingerprint: search_fingerprint(&project, query),
            project,
        }
    }
}

/// A node of a scanned directory tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeNode {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileTreeNode>,
}

impl FileTreeNode {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
            is_dir: false,
            children: Vec::new(),
        }
    }

    pub fn dir(path: impl Into<PathBuf>, children: Vec<FileTreeNode>) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
            is_dir: true,
            children,
        }
    }

    /// Number of nodes in this subtree, including itself
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(FileTreeNode::node_count).sum::<usize>()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_node_count() {
        let tree = FileTreeNode::dir(
            "/proj",
            vec![
                FileTreeNode::file("/proj/a.rs"),
                FileTreeNode::dir("/proj/src", vec![FileTreeNode::file("/proj/src/lib.rs")]),
            ],
        );
        assert_eq!(tree.node_count(), 4);
        assert_eq!(tree.name, "proj");
        assert_eq!(tree.children[1].children[0].name, "lib.rs");
    }

    #[test]
    fn test_search_key_equality() {
        assert_eq!(
            SearchKey::new(Path::new("/p"), "q"),
            SearchKey::new(Path::new("/p"), "q")
        );
        assert_ne!(
            SearchKey::new(Path::new("/p"), "q"),
            SearchKey::new(Path::new("/p"), "r")
        );
    }
}
