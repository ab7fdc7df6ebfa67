//! Grant backing stores

use super::set::GrantRow;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Backing store for permission grants
///
/// Rows are owned by an external administrative workflow; this crate only
/// reads them.
#[async_trait]
pub trait GrantSource: Send + Sync {
    /// Fetch every grant row belonging to a subject
    async fn fetch_grants(&self, subject_id: &str) -> Result<Vec<GrantRow>>;
}

/// In-memory grant source
pub struct InMemoryGrantSource {
    rows: Arc<RwLock<HashMap<String, Vec<GrantRow>>>>,
}

impl InMemoryGrantSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a source seeded with rows
    pub fn with_rows(rows: impl IntoIterator<Item = GrantRow>) -> Self {
        let mut by_subject: HashMap<String, Vec<GrantRow>> = HashMap::new();
        for row in rows {
            by_subject.entry(row.subject_id.clone()).or_default().push(row);
        }

        Self {
            rows: Arc::new(RwLock::new(by_subject)),
        }
    }

    /// Add a grant row
    pub async fn put(&self, row: GrantRow) {
        let mut rows = self.rows.write().await;
        rows.entry(row.subject_id.clone()).or_default().push(row);
    }

    /// Remove every row for `subject_id` on exactly `resource_path`
    pub async fn revoke(&self, subject_id: &str, resource_path: &str) {
        let mut rows = self.rows.write().await;
        if let Some(subject_rows) = rows.get_mut(subject_id) {
            subject_rows.retain(|r| r.resource_path != resource_path);
        }
    }

    /// Number of stored rows
    pub async fn len(&self) -> usize {
        let rows = self.rows.read().await;
        rows.values().map(Vec::len).sum()
    }
}

impl Default for InMemoryGrantSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantSource for InMemoryGrantSource {
    async fn fetch_grants(&self, subject_id: &str) -> Result<Vec<GrantRow>> {
        let rows = self.rows.read().await;
        Ok(rows.get(subject_id).cloned().unwrap_or_default())
    }
}
