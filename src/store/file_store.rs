//! JSON 文件存储
//!
//! 整个存储是一个 JSON 对象，启动时读入内存；每次写入先写临时文件再改名，
//! 进程中途退出也不会留下半个文件。

use crate::error::{StoreError, StoreResult};
use crate::store::{apply, pick, KvStore, StoreChange};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl JsonFileStore {
    /// 打开存储文件，文件不存在时从空存储开始
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Map::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📁 存储文件不存在，将新建: {}", path.display());
                Map::new()
            }
            Err(source) => {
                return Err(StoreError::ReadFailed {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        debug!("已读取存储 {} ({} 个键)", path.display(), data.len());

        let (changes, _) = broadcast::channel(64);
        Ok(Self {
            path,
            data: Mutex::new(data),
            changes,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, data: &Map<String, Value>) -> StoreResult<()> {
        let write_failed = |source| StoreError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };
        let content = serde_json::to_string_pretty(data)?;
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(write_failed)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(write_failed)?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> StoreResult<Map<String, Value>> {
        Ok(pick(&*self.data.lock().await, keys))
    }

    async fn set(&self, entries: Map<String, Value>) -> StoreResult<()> {
        let mut data = self.data.lock().await;
        apply(&mut data, entries, &self.changes);
        self.persist(&data).await
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(&path).await.unwrap();
        let mut entries = Map::new();
        entries.insert("skippedCount".into(), json!(7));
        entries.insert("userData".into(), json!({"fullName": "Ada Lovelace"}));
        store.set(entries).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await.unwrap();
        let got = reopened.get(&["skippedCount", "userData"]).await.unwrap();
        assert_eq!(got["skippedCount"], json!(7));
        assert_eq!(got["userData"]["fullName"], "Ada Lovelace");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileStore::open(&path).await.err().unwrap();
        assert!(matches!(err, StoreError::Malformed(_)));
    }
}
