//! Ignore policy: directory basenames that are never watched.

use std::ffi::{OsStr, OsString};
use std::path::Path;

/// Ordered collection of directory basenames excluded from watching.
///
/// Matching is by exact basename equality, never by full path: a directory
/// named `.git` is excluded anywhere in the tree. Immutable for the
/// lifetime of the observer.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    names: Vec<OsString>,
}

impl IgnoreList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `name` is an ignored basename.
    #[must_use]
    pub fn contains(&self, name: &OsStr) -> bool {
        self.names.iter().any(|n| n.as_os_str() == name)
    }

    /// Whether the final component of `path` is an ignored basename.
    #[must_use]
    pub fn matches_basename(&self, path: &Path) -> bool {
        path.file_name().is_some_and(|name| self.contains(name))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_exact_basenames_only() {
        let ignore = IgnoreList::new([".git", "node_modules"]);
        assert!(ignore.contains(OsStr::new(".git")));
        assert!(!ignore.contains(OsStr::new(".github")));
        assert!(!ignore.contains(OsStr::new("git")));
    }

    #[test]
    fn matches_basename_anywhere_in_tree() {
        let ignore = IgnoreList::new([".git"]);
        assert!(ignore.matches_basename(Path::new("/w/.git")));
        assert!(ignore.matches_basename(Path::new("/w/deep/nested/.git")));
        assert!(!ignore.matches_basename(Path::new("/w/.git/objects")));
    }

    #[test]
    fn root_has_no_basename() {
        let ignore = IgnoreList::new(["/"]);
        assert!(!ignore.matches_basename(Path::new("/")));
    }

    #[test]
    fn empty_list_ignores_nothing() {
        let ignore = IgnoreList::default();
        assert!(ignore.is_empty());
        assert!(!ignore.matches_basename(Path::new("/w/.git")));
    }
}
