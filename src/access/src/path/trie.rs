//! Segment trie keyed by resource path
//!
//! Values attached to a node apply to that node's path and, through
//! longest-prefix lookup, to every path below it.

use std::collections::HashMap;

use super::types::ResourcePath;

#[derive(Debug, Clone)]
struct TrieNode<T> {
    values: Vec<T>,
    children: HashMap<String, TrieNode<T>>,
}

impl<T> Default for TrieNode<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            children: HashMap::new(),
        }
    }
}

/// Prefix trie over resource path segments
#[derive(Debug, Clone)]
pub struct PathTrie<T> {
    root: TrieNode<T>,
    len: usize,
}

impl<T> Default for PathTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PathTrie<T> {
    /// Creates an empty trie
    pub fn new() -> Self {
        Self {
            root: TrieNode::default(),
            len: 0,
        }
    }

    /// Attaches a value to `path`
    ///
    /// Several values may share a path; they are kept in insertion order.
    pub fn insert(&mut self, path: &ResourcePath, value: T) {
        let mut node = &mut self.root;
        for segment in path.segments() {
            node = node.children.entry(segment.clone()).or_default();
        }
        node.values.push(value);
        self.len += 1;
    }

    /// Total number of stored values
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the trie holds no values
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finds the deepest prefix of `path` holding at least one accepted value
    ///
    /// Walks from the root along `path`; at every node the values passing
    /// `accept` are collected, and the deepest non-empty set wins.
    ///
    /// # Returns
    ///
    /// The winning depth (segment count of the matching prefix) and the
    /// accepted values stored there, or `None` if no prefix matches.
    pub fn longest_match<'a, F>(&'a self, path: &ResourcePath, mut accept: F) -> Option<(usize, Vec<&'a T>)>
    where
        F: FnMut(&T) -> bool,
    {
        let mut best = None;
        let mut node = &self.root;
        let mut depth = 0;

        loop {
            let hits: Vec<&T> = node.values.iter().filter(|v| accept(*v)).collect();
            if !hits.is_empty() {
                best = Some((depth, hits));
            }

            let Some(segment) = path.segments().get(depth) else {
                break;
            };
            match node.children.get(segment) {
                Some(child) => {
                    node = child;
                    depth += 1;
                }
                None => break,
            }
        }

        best
    }

    /// Whether any stored prefix covers `path`
    pub fn covers(&self, path: &ResourcePath) -> bool {
        self.longest_match(path, |_| true).is_some()
    }
}

impl<T> FromIterator<(ResourcePath, T)> for PathTrie<T> {
    fn from_iter<I: IntoIterator<Item = (ResourcePath, T)>>(iter: I) -> Self {
        let mut trie = Self::new();
        for (path, value) in iter {
            trie.insert(&path, value);
        }
        trie
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> ResourcePath {
        ResourcePath::new(s).unwrap()
    }

    #[test]
    fn test_longest_match_prefers_deepest() {
        let trie: PathTrie<&str> = [(p("/a"), "a"), (p("/a/b"), "ab")].into_iter().collect();

        let (depth, hits) = trie.longest_match(&p("/a/b/c"), |_| true).unwrap();
        assert_eq!(depth, 2);
        assert_eq!(hits, vec![&"ab"]);

        let (depth, hits) = trie.longest_match(&p("/a/x"), |_| true).unwrap();
        assert_eq!(depth, 1);
        assert_eq!(hits, vec![&"a"]);
    }

    #[test]
    fn test_filter_falls_back_to_shallower_prefix() {
        let trie: PathTrie<(&str, u8)> = [(p("/a"), ("any", 1)), (p("/a/b"), ("edit", 2))]
            .into_iter()
            .collect();

        let (depth, hits) = trie
            .longest_match(&p("/a/b"), |(action, _)| *action == "any")
            .unwrap();
        assert_eq!(depth, 1);
        assert_eq!(hits[0].1, 1);
    }

    #[test]
    fn test_no_partial_segment_match() {
        let trie: PathTrie<()> = [(p("/loan"), ())].into_iter().collect();
        assert!(trie.covers(&p("/loan/1")));
        assert!(!trie.covers(&p("/loans")));
        assert!(!trie.covers(&p("/")));
    }

    #[test]
    fn test_root_covers_everything() {
        let trie: PathTrie<()> = [(ResourcePath::root(), ())].into_iter().collect();
        assert!(trie.covers(&p("/anything/at/all")));
        assert!(trie.covers(&ResourcePath::root()));
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut trie = PathTrie::new();
        trie.insert(&p("/x"), 1);
        trie.insert(&p("/x"), 1);
        assert_eq!(trie.len(), 2);
        let (_, hits) = trie.longest_match(&p("/x"), |_| true).unwrap();
        assert_eq!(hits.len(), 2);
    }
}
