//! 业务记录
//!
//! 存储中的键与浏览器扩展时代保持一致，已有的数据文件可以直接沿用：
//!
//! | 键 | 内容 |
//! |---|---|
//! | `appliedCount` / `skippedCount` / `failedCount` | 累计计数 |
//! | `jobHistory` | 申请历史（最新在前，最多 500 条） |
//! | `userData` | 用户资料 |
//! | `settings` | 节奏与限制设置 |

use crate::config::Settings;
use crate::error::StoreResult;
use crate::models::{upsert_bounded, CounterKind, HistoryEntry, ProfileData, RunCounters, HISTORY_CAPACITY};
use crate::store::KvStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

pub const APPLIED_COUNT: &str = "appliedCount";
pub const SKIPPED_COUNT: &str = "skippedCount";
pub const FAILED_COUNT: &str = "failedCount";
pub const JOB_HISTORY: &str = "jobHistory";
pub const USER_DATA: &str = "userData";
pub const SETTINGS: &str = "settings";

fn counter_key(kind: CounterKind) -> &'static str {
    match kind {
        CounterKind::Applied => APPLIED_COUNT,
        CounterKind::Skipped => SKIPPED_COUNT,
        CounterKind::Failed => FAILED_COUNT,
    }
}

/// 业务记录读写
#[derive(Clone)]
pub struct Records {
    store: Arc<dyn KvStore>,
}

impl Records {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let mut data = self.store.get(&[key]).await?;
        match data.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let mut entries = Map::new();
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        self.store.set(entries).await
    }

    /// 累计计数
    pub async fn counters(&self) -> StoreResult<RunCounters> {
        let data = self
            .store
            .get(&[APPLIED_COUNT, SKIPPED_COUNT, FAILED_COUNT])
            .await?;
        let count = |key: &str| data.get(key).and_then(Value::as_u64).unwrap_or(0);
        Ok(RunCounters {
            applied: count(APPLIED_COUNT),
            skipped: count(SKIPPED_COUNT),
            failed: count(FAILED_COUNT),
        })
    }

    /// 累计计数 +1，返回更新后的全部计数
    pub async fn bump(&self, kind: CounterKind) -> StoreResult<RunCounters> {
        let mut counters = self.counters().await?;
        counters.bump(kind);
        let value = match kind {
            CounterKind::Applied => counters.applied,
            CounterKind::Skipped => counters.skipped,
            CounterKind::Failed => counters.failed,
        };
        self.write(counter_key(kind), &value).await?;
        Ok(counters)
    }

    /// 清零累计计数
    pub async fn reset_counters(&self) -> StoreResult<()> {
        let mut entries = Map::new();
        for key in [APPLIED_COUNT, SKIPPED_COUNT, FAILED_COUNT] {
            entries.insert(key.to_string(), Value::from(0u64));
        }
        self.store.set(entries).await
    }

    /// 申请历史（最新在前）
    pub async fn history(&self) -> StoreResult<Vec<HistoryEntry>> {
        match self.read::<Vec<HistoryEntry>>(JOB_HISTORY).await {
            Ok(history) => Ok(history.unwrap_or_default()),
            Err(e) => {
                warn!("⚠️ 历史记录无法解析，将重新开始记录: {}", e);
                Ok(Vec::new())
            }
        }
    }

    /// 写入一条历史记录（同一职位覆盖旧记录）
    pub async fn record_history(&self, entry: HistoryEntry) -> StoreResult<()> {
        let mut history = self.history().await?;
        upsert_bounded(&mut history, entry, HISTORY_CAPACITY);
        self.write(JOB_HISTORY, &history).await
    }

    pub async fn profile(&self) -> StoreResult<Option<ProfileData>> {
        self.read(USER_DATA).await
    }

    pub async fn save_profile(&self, profile: &ProfileData) -> StoreResult<()> {
        self.write(USER_DATA, profile).await
    }

    pub async fn clear_profile(&self) -> StoreResult<()> {
        self.write(USER_DATA, &Value::Null).await
    }

    pub async fn settings(&self) -> StoreResult<Option<Settings>> {
        Ok(self.read::<Settings>(SETTINGS).await?.map(Settings::normalized))
    }

    pub async fn save_settings(&self, settings: &Settings) -> StoreResult<()> {
        self.write(SETTINGS, settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HistoryStatus;
    use crate::models::WorkItem;
    use crate::store::MemoryStore;
    use crate::surface::ElementRef;

    fn records() -> Records {
        Records::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_counters_accumulate() {
        let records = records();
        records.bump(CounterKind::Applied).await.unwrap();
        records.bump(CounterKind::Applied).await.unwrap();
        let counters = records.bump(CounterKind::Failed).await.unwrap();
        assert_eq!(
            counters,
            RunCounters {
                applied: 2,
                skipped: 0,
                failed: 1
            }
        );

        records.reset_counters().await.unwrap();
        assert_eq!(records.counters().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_history_is_upserted_newest_first() {
        let records = records();
        let item = |id: &str| WorkItem::new(id, ElementRef::new("n0"));

        records
            .record_history(HistoryEntry::from_item(&item("40001"), HistoryStatus::Skipped))
            .await
            .unwrap();
        records
            .record_history(HistoryEntry::from_item(&item("40002"), HistoryStatus::Applied))
            .await
            .unwrap();
        records
            .record_history(HistoryEntry::from_item(&item("40001"), HistoryStatus::Applied))
            .await
            .unwrap();

        let history = records.history().await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].job_id, "40002");
        assert_eq!(history[1].status, HistoryStatus::Applied);

        let raw = records.store().get(&[JOB_HISTORY]).await.unwrap();
        assert_eq!(raw[JOB_HISTORY][0]["status"], "applied");
        assert!(raw[JOB_HISTORY][0]["appliedAt"].is_string());
    }

    #[tokio::test]
    async fn test_profile_and_settings_round_trip() {
        let records = records();
        assert!(records.profile().await.unwrap().is_none());

        let profile = ProfileData {
            full_name: "Ada Lovelace".into(),
            ..Default::default()
        };
        records.save_profile(&profile).await.unwrap();
        assert_eq!(records.profile().await.unwrap(), Some(profile));

        records.clear_profile().await.unwrap();
        assert!(records.profile().await.unwrap().is_none());

        let settings = Settings {
            delay_min_ms: 9000,
            delay_max_ms: 2000,
            ..Default::default()
        };
        records.save_settings(&settings).await.unwrap();
        let loaded = records.settings().await.unwrap().unwrap();
        assert_eq!((loaded.delay_min_ms, loaded.delay_max_ms), (2000, 9000));
    }
}
