//! Permission grants and per-subject grant sets

use super::value::GrantValue;
use crate::error::Result;
use crate::path::{PathTrie, ResourcePath};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Grant row exactly as a backing store returns it
///
/// `value` keeps the loosely typed flag; an absent field stays `None` while
/// an explicit `null` becomes `Some(Value::Null)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantRow {
    /// Subject the grant belongs to
    pub subject_id: String,

    /// Resource path prefix
    pub resource_path: String,

    /// Optional action name
    #[serde(default)]
    pub action: Option<String>,

    /// Raw grant flag
    #[serde(default, deserialize_with = "present_value", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

fn present_value<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl GrantRow {
    /// Create a row with a raw value
    pub fn new(
        subject_id: impl Into<String>,
        resource_path: impl Into<String>,
        action: Option<&str>,
        value: Value,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            resource_path: resource_path.into(),
            action: action.map(str::to_string),
            value: Some(value),
        }
    }
}

/// A normalized permission grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Subject the grant belongs to
    pub subject_id: String,

    /// Resource path prefix the grant covers
    pub resource_path: ResourcePath,

    /// Action restriction; `None` matches every action
    pub action: Option<String>,

    /// Canonical grant value
    pub value: GrantValue,
}

impl PermissionGrant {
    /// Normalize a backing-store row
    ///
    /// Blank actions are treated as absent.
    pub fn from_row(row: &GrantRow) -> Result<Self> {
        let resource_path = ResourcePath::new(&row.resource_path)?;
        let action = row
            .action
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);

        Ok(Self {
            subject_id: row.subject_id.clone(),
            resource_path,
            action,
            value: GrantValue::normalize(row.value.as_ref()),
        })
    }

    /// Whether this grant applies to the requested action
    ///
    /// An action-less grant applies to everything; an action-specific grant
    /// only to requests naming that action.
    pub fn applies_to(&self, action: Option<&str>) -> bool {
        match (&self.action, action) {
            (None, _) => true,
            (Some(granted), Some(requested)) => granted == requested,
            (Some(_), None) => false,
        }
    }
}

/// All grants of one subject, indexed for longest-prefix lookup
#[derive(Debug, Clone, Default)]
pub struct GrantSet {
    grants: Vec<PermissionGrant>,
    trie: PathTrie<usize>,
}

impl GrantSet {
    /// Index a subject's grants
    pub fn new(grants: Vec<PermissionGrant>) -> Self {
        let trie = grants
            .iter()
            .enumerate()
            .map(|(idx, g)| (g.resource_path.clone(), idx))
            .collect();

        Self { grants, trie }
    }

    /// The grants in this set
    pub fn grants(&self) -> &[PermissionGrant] {
        &self.grants
    }

    /// Number of grants
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Resolve the effective grant value for a path and action
    ///
    /// The deepest grant path covering `path` whose action applies wins.
    /// At that depth an action-specific grant beats an action-less one,
    /// and any remaining disagreement resolves to `Denied`.
    ///
    /// # Returns
    ///
    /// `None` if no grant applies, otherwise the canonical value.
    pub fn resolve(&self, path: &ResourcePath, action: Option<&str>) -> Option<GrantValue> {
        let (_, hits) = self
            .trie
            .longest_match(path, |idx| self.grants[*idx].applies_to(action))?;

        let hits: Vec<&PermissionGrant> = hits.into_iter().map(|idx| &self.grants[*idx]).collect();
        let specific: Vec<&PermissionGrant> =
            hits.iter().copied().filter(|g| g.action.is_some()).collect();
        let winners = if specific.is_empty() { hits } else { specific };

        let all_granted = winners.iter().all(|g| g.value.canonical().is_granted());
        Some(if all_granted {
            GrantValue::Granted
        } else {
            GrantValue::Denied
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grant(path: &str, action: Option<&str>, value: Value) -> PermissionGrant {
        PermissionGrant::from_row(&GrantRow::new("u-1", path, action, value)).unwrap()
    }

    fn p(s: &str) -> ResourcePath {
        ResourcePath::new(s).unwrap()
    }

    #[test]
    fn test_more_specific_grant_wins() {
        let set = GrantSet::new(vec![grant("/a", None, json!("No")), grant("/a/b", None, json!("Yes"))]);

        assert_eq!(set.resolve(&p("/a/b/c"), None), Some(GrantValue::Granted));
        assert_eq!(set.resolve(&p("/a/x"), None), Some(GrantValue::Denied));
    }

    #[test]
    fn test_prefix_grant_covers_children() {
        let set = GrantSet::new(vec![grant("/a", None, json!(1))]);
        assert_eq!(set.resolve(&p("/a/b"), None), Some(GrantValue::Granted));
        assert_eq!(set.resolve(&p("/ab"), None), None);
    }

    #[test]
    fn test_action_matching() {
        let set = GrantSet::new(vec![
            grant("/loans", Some("edit"), json!("Yes")),
            grant("/loans", Some("delete"), json!("No")),
        ]);

        assert_eq!(set.resolve(&p("/loans/7"), Some("edit")), Some(GrantValue::Granted));
        assert_eq!(set.resolve(&p("/loans/7"), Some("delete")), Some(GrantValue::Denied));
        assert_eq!(set.resolve(&p("/loans/7"), Some("view")), None);
        assert_eq!(set.resolve(&p("/loans/7"), None), None);
    }

    #[test]
    fn test_actionless_grant_matches_any_action() {
        let set = GrantSet::new(vec![grant("/families", None, json!(true))]);
        assert_eq!(set.resolve(&p("/families"), Some("delete")), Some(GrantValue::Granted));
    }

    #[test]
    fn test_specific_action_beats_actionless_at_same_depth() {
        let set = GrantSet::new(vec![
            grant("/payments", None, json!("Yes")),
            grant("/payments", Some("approve"), json!("No")),
        ]);

        assert_eq!(set.resolve(&p("/payments"), Some("approve")), Some(GrantValue::Denied));
        assert_eq!(set.resolve(&p("/payments"), Some("view")), Some(GrantValue::Granted));
    }

    #[test]
    fn test_conflicting_duplicates_fail_closed() {
        let set = GrantSet::new(vec![grant("/x", None, json!("1")), grant("/x", None, json!("0"))]);
        assert_eq!(set.resolve(&p("/x"), None), Some(GrantValue::Denied));
    }

    #[test]
    fn test_identical_duplicates_are_idempotent() {
        let set = GrantSet::new(vec![grant("/x", None, json!("Yes")), grant("/x", None, json!(1))]);
        assert_eq!(set.resolve(&p("/x/y"), None), Some(GrantValue::Granted));
    }

    #[test]
    fn test_row_deserialization_keeps_null_distinct() {
        let absent: GrantRow =
            serde_json::from_str(r#"{"subject_id":"u","resource_path":"/a"}"#).unwrap();
        let null: GrantRow =
            serde_json::from_str(r#"{"subject_id":"u","resource_path":"/a","value":null}"#).unwrap();

        assert_eq!(absent.value, None);
        assert_eq!(null.value, Some(Value::Null));
    }

    #[test]
    fn test_blank_action_is_absent() {
        let g = grant("/a", Some("  "), json!("Yes"));
        assert!(g.action.is_none());
    }

    #[test]
    fn test_invalid_row_path() {
        let result = PermissionGrant::from_row(&GrantRow::new("u", "a/b", None, json!(1)));
        assert!(result.is_err());
    }
}
