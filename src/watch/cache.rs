//! Watch-descriptor cache: the wd → directory path mapping.
//!
//! The cache is the single source of truth for which directories the kernel
//! watches on our behalf. It is confined to the watcher thread, so no
//! locking is needed. Bulk operations work on component-wise path prefixes:
//! `/w/foo` is never treated as a prefix of `/w/foobar`.

use std::collections::HashMap;
use std::collections::hash_map;
use std::hash::Hash;
use std::path::{Path, PathBuf};

/// Mapping from watch handle to absolute directory path.
///
/// Generic over the handle type: production code keys by
/// `inotify::WatchDescriptor`, tests by plain integers.
#[derive(Debug)]
pub struct WatchCache<K> {
    entries: HashMap<K, PathBuf>,
}

impl<K> Default for WatchCache<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> WatchCache<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry. The caller guarantees `key` is not already
    /// present and that no other entry names the same path.
    pub fn insert(&mut self, key: K, path: PathBuf) {
        debug_assert!(
            !self.entries.contains_key(&key),
            "watch handle registered twice"
        );
        self.entries.insert(key, path);
    }

    /// Remove one entry. No-op when absent; returns the evicted path.
    pub fn erase(&mut self, key: &K) -> Option<PathBuf> {
        self.entries.remove(key)
    }

    /// Path for a handle.
    pub fn lookup(&self, key: &K) -> Option<&Path> {
        self.entries.get(key).map(PathBuf::as_path)
    }

    /// Handle for a path. Linear scan; only used on directory deletion,
    /// where the cost is negligible.
    pub fn find_by_path(&self, path: &Path) -> Option<K> {
        self.entries
            .iter()
            .find(|(_, p)| p.as_path() == path)
            .map(|(k, _)| k.clone())
    }

    /// Remove every entry whose path has `prefix` as a component-wise
    /// prefix (the prefix itself included). Returns the evicted entries so
    /// the caller can drop the corresponding kernel watches.
    pub fn remove_subtree(&mut self, prefix: &Path) -> Vec<(K, PathBuf)> {
        let keys: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, p)| p.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        keys.into_iter()
            .filter_map(|k| self.entries.remove(&k).map(|p| (k, p)))
            .collect()
    }

    /// Replace the component-wise prefix `old` with `new` in every matching
    /// entry. No kernel interaction: after a rename the kernel watches
    /// follow the inodes, only our cached paths go stale.
    pub fn rewrite_prefix(&mut self, old: &Path, new: &Path) {
        for path in self.entries.values_mut() {
            if let Ok(rest) = path.strip_prefix(old) {
                *path = if rest.as_os_str().is_empty() {
                    new.to_path_buf()
                } else {
                    new.join(rest)
                };
            }
        }
    }

    /// Remove and return all entries (used by reinitialization).
    pub fn drain(&mut self) -> Vec<(K, PathBuf)> {
        self.entries.drain().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate entries (diagnostics and tests).
    pub fn iter(&self) -> hash_map::Iter<'_, K, PathBuf> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cache_with(entries: &[(i32, &str)]) -> WatchCache<i32> {
        let mut cache = WatchCache::new();
        for (wd, path) in entries {
            cache.insert(*wd, PathBuf::from(path));
        }
        cache
    }

    #[test]
    fn insert_lookup_erase() {
        let mut cache = cache_with(&[(1, "/w"), (2, "/w/d")]);
        assert_eq!(cache.lookup(&1), Some(Path::new("/w")));
        assert_eq!(cache.lookup(&2), Some(Path::new("/w/d")));
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.erase(&2), Some(PathBuf::from("/w/d")));
        assert_eq!(cache.lookup(&2), None);
        // Erasing again is a no-op.
        assert_eq!(cache.erase(&2), None);
    }

    #[test]
    fn find_by_path_is_exact() {
        let cache = cache_with(&[(1, "/w"), (2, "/w/d"), (3, "/w/d/e")]);
        assert_eq!(cache.find_by_path(Path::new("/w/d")), Some(2));
        assert_eq!(cache.find_by_path(Path::new("/w/x")), None);
    }

    #[test]
    fn remove_subtree_is_component_wise() {
        let mut cache = cache_with(&[
            (1, "/w"),
            (2, "/w/foo"),
            (3, "/w/foo/bar"),
            (4, "/w/foobar"),
        ]);

        let removed = cache.remove_subtree(Path::new("/w/foo"));
        let mut removed_paths: Vec<PathBuf> = removed.into_iter().map(|(_, p)| p).collect();
        removed_paths.sort();
        assert_eq!(
            removed_paths,
            vec![PathBuf::from("/w/foo"), PathBuf::from("/w/foo/bar")]
        );

        // `/w/foobar` shares a string prefix but not a component prefix.
        assert_eq!(cache.find_by_path(Path::new("/w/foobar")), Some(4));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn remove_subtree_of_absent_prefix_is_empty() {
        let mut cache = cache_with(&[(1, "/w")]);
        assert!(cache.remove_subtree(Path::new("/w/none")).is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rewrite_prefix_rewrites_subtree_only() {
        let mut cache = cache_with(&[
            (1, "/w"),
            (2, "/w/d"),
            (3, "/w/d/e"),
            (4, "/w/dx"),
        ]);

        cache.rewrite_prefix(Path::new("/w/d"), Path::new("/w/D"));

        assert_eq!(cache.lookup(&1), Some(Path::new("/w")));
        assert_eq!(cache.lookup(&2), Some(Path::new("/w/D")));
        assert_eq!(cache.lookup(&3), Some(Path::new("/w/D/e")));
        // String-prefix sibling stays untouched.
        assert_eq!(cache.lookup(&4), Some(Path::new("/w/dx")));
    }

    #[test]
    fn rewrite_prefix_can_relocate_across_parents() {
        let mut cache = cache_with(&[(1, "/w/a/d"), (2, "/w/a/d/e")]);
        cache.rewrite_prefix(Path::new("/w/a/d"), Path::new("/w/b/d2"));
        assert_eq!(cache.lookup(&1), Some(Path::new("/w/b/d2")));
        assert_eq!(cache.lookup(&2), Some(Path::new("/w/b/d2/e")));
    }

    #[test]
    fn drain_empties_the_cache() {
        let mut cache = cache_with(&[(1, "/w"), (2, "/w/d")]);
        let drained = cache.drain();
        assert_eq!(drained.len(), 2);
        assert!(cache.is_empty());
    }

    proptest! {
        // rewrite_prefix(A, B) followed by rewrite_prefix(B, A) restores the
        // cache exactly.
        #[test]
        fn rewrite_prefix_round_trips(
            trees in prop::collection::vec(
                prop::collection::vec("[a-d]{1,3}", 1..5),
                1..12,
            )
        ) {
            let mut cache: WatchCache<i32> = WatchCache::new();
            for (i, segments) in trees.iter().enumerate() {
                let mut path = PathBuf::from("/r");
                for segment in segments {
                    path.push(segment);
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                cache.insert(i as i32, path);
            }

            let mut before: Vec<(i32, PathBuf)> =
                cache.iter().map(|(k, p)| (*k, p.clone())).collect();
            before.sort();

            cache.rewrite_prefix(Path::new("/r/a"), Path::new("/q/x/y"));
            cache.rewrite_prefix(Path::new("/q/x/y"), Path::new("/r/a"));

            let mut after: Vec<(i32, PathBuf)> =
                cache.iter().map(|(k, p)| (*k, p.clone())).collect();
            after.sort();

            prop_assert_eq!(before, after);
        }
    }
}
