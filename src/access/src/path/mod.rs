//! Hierarchical resource paths and longest-prefix lookup
//!
//! Every prefix comparison in the crate goes through this module: role-class
//! allow-lists and permission grants are both stored in a [`PathTrie`].
//!
//! # Examples
//!
//! ```
//! use casebook_access::path::{PathTrie, ResourcePath};
//!
//! let mut trie = PathTrie::new();
//! trie.insert(&ResourcePath::new("/families").unwrap(), "families");
//! trie.insert(&ResourcePath::new("/families/loans").unwrap(), "loans");
//!
//! let path = ResourcePath::new("/families/loans/42").unwrap();
//! let (depth, hits) = trie.longest_match(&path, |_| true).unwrap();
//! assert_eq!(depth, 2);
//! assert_eq!(hits, vec![&"loans"]);
//! ```

mod types;
mod trie;

pub use types::{PathError, PathResult, ResourcePath};
pub use trie::PathTrie;
