//! JSON file store backend.
//!
//! All keys live in one JSON object. Every `set` re-reads the file, applies
//! the overwrite and replaces the file through a temporary sibling plus
//! rename, so a crash mid-write leaves the previous document intact.
//! Values written by another process between two of our writes are kept
//! (last writer wins per key, not per file).

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::debug;

use super::{KeyValueStore, StoreError};

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(self.corrupt("top-level value is not an object")),
            Err(e) => Err(self.corrupt(&e.to_string())),
        }
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_vec_pretty(document)
            .map_err(|e| self.corrupt(&e.to_string()))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn corrupt(&self, reason: &str) -> StoreError {
        StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StoreError> {
        let mut document = self.read_document().await?;
        Ok(keys
            .iter()
            .filter_map(|key| document.remove(*key).map(|v| ((*key).to_string(), v)))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut document = self.read_document().await?;
        let count = entries.len();
        document.extend(entries);
        self.write_document(&document).await?;

        debug!(path = %self.path.display(), keys = count, "Store written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("store.json"));
        assert!(store.get(&["logs"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_keeps_other_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("store.json"));

        store
            .set(HashMap::from([("a".to_string(), json!([1, 2]))]))
            .await
            .unwrap();
        store
            .set(HashMap::from([("b".to_string(), json!({"x": true}))]))
            .await
            .unwrap();

        let values = store.get(&["a", "b"]).await.unwrap();
        assert_eq!(values["a"], json!([1, 2]));
        assert_eq!(values["b"], json!({"x": true}));
        assert!(!dir.path().join("nested").join("store.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        FileStore::new(&path)
            .set(HashMap::from([("settings".to_string(), json!({"enabled": false}))]))
            .await
            .unwrap();

        let reopened = FileStore::new(&path);
        let values = reopened.get(&["settings"]).await.unwrap();
        assert_eq!(values["settings"]["enabled"], json!(false));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(
            store.get(&["logs"]).await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
