//! Navigation menu derivation
//!
//! Filters a declarative resource catalog down to what a subject may reach.
//! A node survives if it is allowed itself or if any descendant survives.
//! Order, labels and grouping are copied from the catalog untouched.

use crate::engine::ResolutionEngine;
use crate::identity::Subject;
use crate::path::ResourcePath;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A node of the navigable resource catalog
///
/// Nodes without a `path` are pure containers; they are only kept to host
/// allowed children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Resource path of this node, if directly addressable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Display label
    pub label: String,

    /// Ordered children
    #[serde(default)]
    pub children: Vec<ResourceNode>,
}

impl ResourceNode {
    /// Addressable node without children
    pub fn leaf(path: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            label: label.into(),
            children: Vec::new(),
        }
    }

    /// Pure container node
    pub fn group(label: impl Into<String>, children: Vec<ResourceNode>) -> Self {
        Self {
            path: None,
            label: label.into(),
            children,
        }
    }

    /// Addressable node with children
    pub fn section(path: impl Into<String>, label: impl Into<String>, children: Vec<ResourceNode>) -> Self {
        Self {
            path: Some(path.into()),
            label: label.into(),
            children,
        }
    }

    /// Paths of this node and its descendants, depth-first pre-order
    pub fn paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(path) = &self.path {
            out.push(path);
        }
        for child in &self.children {
            child.collect_paths(out);
        }
    }

    fn filtered(&self, allowed: &HashSet<&str>) -> Option<ResourceNode> {
        let children: Vec<ResourceNode> = self
            .children
            .iter()
            .filter_map(|child| child.filtered(allowed))
            .collect();

        let self_allowed = self
            .path
            .as_deref()
            .is_some_and(|path| allowed.contains(path));

        if self_allowed || !children.is_empty() {
            Some(ResourceNode {
                path: self.path.clone(),
                label: self.label.clone(),
                children,
            })
        } else {
            None
        }
    }
}

/// Derives per-subject menus from a catalog
#[derive(Clone)]
pub struct MenuDeriver {
    engine: Arc<ResolutionEngine>,
}

impl MenuDeriver {
    /// Create a deriver backed by the resolution engine
    pub fn new(engine: Arc<ResolutionEngine>) -> Self {
        Self { engine }
    }

    /// Filter `catalog` to what `subject` may access
    ///
    /// The catalog root is the menu container and is always returned, with
    /// its children filtered. It keeps its own `path` only under the same
    /// rule as any other node: allowed itself, or hosting a kept descendant. Every node path is decided in one batch, so
    /// the whole menu reflects a single policy snapshot and grant fetch.
    /// Unparseable node paths are never allowed.
    pub async fn derive_menu(&self, subject: &Subject, catalog: &ResourceNode) -> ResourceNode {
        let raw_paths = catalog.paths();

        let mut seen = HashSet::new();
        let mut candidates: Vec<(&str, ResourcePath)> = Vec::new();
        for raw in raw_paths {
            if !seen.insert(raw) {
                continue;
            }
            match ResourcePath::new(raw) {
                Ok(path) => candidates.push((raw, path)),
                Err(e) => debug!("Skipping catalog node with invalid path '{}': {}", raw, e),
            }
        }

        let paths: Vec<ResourcePath> = candidates.iter().map(|(_, path)| path.clone()).collect();
        let decisions = self.engine.decide_many(subject, &paths).await;

        if decisions.iter().any(|d| d.is_degraded()) {
            warn!(
                "Menu for subject={} derived without grants: grant store unavailable",
                subject.id
            );
        }

        let allowed: HashSet<&str> = candidates
            .iter()
            .zip(decisions.iter())
            .filter(|(_, decision)| decision.allowed)
            .map(|((raw, _), _)| *raw)
            .collect();

        let children: Vec<ResourceNode> = catalog
            .children
            .iter()
            .filter_map(|child| child.filtered(&allowed))
            .collect();

        // A denied root with nothing under it is returned as a bare container
        let root_allowed = catalog
            .path
            .as_deref()
            .is_some_and(|path| allowed.contains(path));
        let path = if root_allowed || !children.is_empty() {
            catalog.path.clone()
        } else {
            None
        };

        ResourceNode {
            path,
            label: catalog.label.clone(),
            children,
        }
    }
}
