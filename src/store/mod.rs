//! 持久化存储
//!
//! ## 职责
//!
//! 引擎只依赖一个最小的键值存储接口：按键读取、批量写入、订阅变化。
//!
//! - `MemoryStore` - 内存实现（测试 / 不需要持久化时）
//! - `JsonFileStore` - 整个存储保存为一个 JSON 文件
//! - `Records` - 计数器、历史记录、用户资料等业务记录的读写

pub mod file_store;
pub mod records;

pub use file_store::JsonFileStore;
pub use records::Records;

use crate::error::StoreResult;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// 一个键的变化
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: String,
    pub value: Value,
}

/// 键值存储接口
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 读取若干个键，不存在的键不出现在结果中
    async fn get(&self, keys: &[&str]) -> StoreResult<Map<String, Value>>;

    /// 批量写入
    async fn set(&self, entries: Map<String, Value>) -> StoreResult<()>;

    /// 订阅变化
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// 读取若干键的子集
pub(crate) fn pick(data: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .filter_map(|key| data.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}

/// 写入并广播变化
pub(crate) fn apply(
    data: &mut Map<String, Value>,
    entries: Map<String, Value>,
    changes: &broadcast::Sender<StoreChange>,
) {
    for (key, value) in entries {
        data.insert(key.clone(), value.clone());
        let _ = changes.send(StoreChange { key, value });
    }
}

/// 内存存储
pub struct MemoryStore {
    data: Mutex<Map<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            data: Mutex::new(Map::new()),
            changes,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> StoreResult<Map<String, Value>> {
        Ok(pick(&self.lock(), keys))
    }

    async fn set(&self, entries: Map<String, Value>) -> StoreResult<()> {
        apply(&mut self.lock(), entries, &self.changes);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
