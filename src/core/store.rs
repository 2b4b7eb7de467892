//! Record persistence for workflows, variant sets and article history.
//!
//! The core treats storage as an opaque key-value collaborator and works
//! without any store at all. Two implementations are provided:
//! - `MemoryStore`: process-local map
//! - `FileStore`: one pretty-printed JSON file per record under
//!   `<home>/records/<kind>/<id>.json`

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::ArticleRecord;

/// Kinds of records the core persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Workflow,
    VariantSet,
    Article,
}

impl RecordKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            RecordKind::Workflow => "workflows",
            RecordKind::VariantSet => "variant_sets",
            RecordKind::Article => "articles",
        }
    }
}

/// Opaque async key-value store
#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Option<Value>>;

    async fn put(&self, kind: RecordKind, id: Uuid, record: Value) -> Result<()>;

    /// Returns whether a record was removed
    async fn delete(&self, kind: RecordKind, id: Uuid) -> Result<bool>;

    async fn list(&self, kind: RecordKind) -> Result<Vec<Uuid>>;
}

/// Serialize and store a typed record
pub async fn put_record<T: Serialize + Sync>(
    store: &dyn Store,
    kind: RecordKind,
    id: Uuid,
    record: &T,
) -> Result<()> {
    let value = serde_json::to_value(record).context("Failed to serialize record")?;
    store.put(kind, id, value).await
}

/// Load and deserialize a typed record
pub async fn get_record<T: DeserializeOwned>(
    store: &dyn Store,
    kind: RecordKind,
    id: Uuid,
) -> Result<Option<T>> {
    match store.get(kind, id).await? {
        Some(value) => {
            let record = serde_json::from_value(value)
                .with_context(|| format!("Failed to parse {:?} record {}", kind, id))?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

/// Most recent generated articles first
pub async fn article_history(store: &dyn Store, limit: usize) -> Result<Vec<ArticleRecord>> {
    let mut articles = Vec::new();
    for id in store.list(RecordKind::Article).await? {
        if let Some(article) = get_record::<ArticleRecord>(store, RecordKind::Article, id).await? {
            articles.push(article);
        }
    }

    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    articles.truncate(limit);
    Ok(articles)
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(RecordKind, Uuid), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Option<Value>> {
        Ok(self.records.read().await.get(&(kind, id)).cloned())
    }

    async fn put(&self, kind: RecordKind, id: Uuid, record: Value) -> Result<()> {
        self.records.write().await.insert((kind, id), record);
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, id: Uuid) -> Result<bool> {
        Ok(self.records.write().await.remove(&(kind, id)).is_some())
    }

    async fn list(&self, kind: RecordKind) -> Result<Vec<Uuid>> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| *id)
            .collect())
    }
}

/// File-based store using one JSON document per record
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `base_dir`, creating it if needed
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .await
            .with_context(|| format!("Failed to create store directory: {}", base_dir.display()))?;
        Ok(Self { base_dir })
    }

    /// Open the store under the configured home directory
    pub async fn open_default() -> Result<Self> {
        Self::open(crate::config::records_dir()?).await
    }

    fn kind_dir(&self, kind: RecordKind) -> PathBuf {
        self.base_dir.join(kind.dir_name())
    }

    fn record_path(&self, kind: RecordKind, id: Uuid) -> PathBuf {
        self.kind_dir(kind).join(format!("{}.json", id))
    }
}

#[async_trait]
impl Store for FileStore {
    async fn get(&self, kind: RecordKind, id: Uuid) -> Result<Option<Value>> {
        let path = self.record_path(kind, id);

        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read record: {}", path.display()))?;

        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse record: {}", path.display()))?;

        Ok(Some(value))
    }

    async fn put(&self, kind: RecordKind, id: Uuid, record: Value) -> Result<()> {
        let dir = self.kind_dir(kind);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let path = self.record_path(kind, id);
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&record)?;

        // Write then rename so readers never see a half-written record
        fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write record: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to move record into place: {}", path.display()))?;

        Ok(())
    }

    async fn delete(&self, kind: RecordKind, id: Uuid) -> Result<bool> {
        let path = self.record_path(kind, id);

        if !path.exists() {
            return Ok(false);
        }

        fs::remove_file(&path)
            .await
            .with_context(|| format!("Failed to delete record: {}", path.display()))?;
        Ok(true)
    }

    async fn list(&self, kind: RecordKind) -> Result<Vec<Uuid>> {
        let dir = self.kind_dir(kind);

        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    if let Ok(id) = Uuid::parse_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        store.put(RecordKind::Workflow, id, json!({"a": 1})).await.unwrap();

        assert_eq!(
            store.get(RecordKind::Workflow, id).await.unwrap(),
            Some(json!({"a": 1}))
        );
        // Kinds are separate namespaces
        assert!(store.get(RecordKind::VariantSet, id).await.unwrap().is_none());
        assert_eq!(store.list(RecordKind::Workflow).await.unwrap(), vec![id]);

        assert!(store.delete(RecordKind::Workflow, id).await.unwrap());
        assert!(!store.delete(RecordKind::Workflow, id).await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_put_get_delete() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path().join("records")).await.unwrap();
        let id = Uuid::new_v4();

        store
            .put(RecordKind::VariantSet, id, json!({"name": "A"}))
            .await
            .unwrap();

        let path = temp
            .path()
            .join("records")
            .join("variant_sets")
            .join(format!("{}.json", id));
        assert!(path.exists());

        let loaded = store.get(RecordKind::VariantSet, id).await.unwrap();
        assert_eq!(loaded, Some(json!({"name": "A"})));

        assert!(store.delete(RecordKind::VariantSet, id).await.unwrap());
        assert!(store.get(RecordKind::VariantSet, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_list_ignores_foreign_files() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::open(temp.path()).await.unwrap();
        let id = Uuid::new_v4();

        store.put(RecordKind::Article, id, json!({})).await.unwrap();
        std::fs::write(temp.path().join("articles").join("notes.txt"), "x").unwrap();

        assert_eq!(store.list(RecordKind::Article).await.unwrap(), vec![id]);
        assert!(store.list(RecordKind::Workflow).await.unwrap().is_empty());
    }
}
