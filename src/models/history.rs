//! 申请历史记录
//!
//! 历史列表按时间倒序（最新在前），同一职位ID只保留一条（后写覆盖），最多 500 条。

use crate::models::work_item::{FormOutcome, WorkItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 历史列表容量
pub const HISTORY_CAPACITY: usize = 500;

/// 历史记录状态（同时也是处理结果的原因码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryStatus {
    Applied,
    Skipped,
    SkippedNoEasyApply,
    SkippedMaxAttempts,
    SkippedLoadFailed,
    SkippedModalFailed,
    SkippedTimeout,
    AlreadyApplied,
    Failed,
    Stopped,
}

impl HistoryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryStatus::Applied => "applied",
            HistoryStatus::Skipped => "skipped",
            HistoryStatus::SkippedNoEasyApply => "skipped_no_easy_apply",
            HistoryStatus::SkippedMaxAttempts => "skipped_max_attempts",
            HistoryStatus::SkippedLoadFailed => "skipped_load_failed",
            HistoryStatus::SkippedModalFailed => "skipped_modal_failed",
            HistoryStatus::SkippedTimeout => "skipped_timeout",
            HistoryStatus::AlreadyApplied => "already_applied",
            HistoryStatus::Failed => "failed",
            HistoryStatus::Stopped => "stopped",
        }
    }

    /// 该原因对应的处理结果（决定计数器）
    pub fn outcome(self) -> FormOutcome {
        match self {
            HistoryStatus::Applied => FormOutcome::Applied,
            HistoryStatus::Failed => FormOutcome::Failed,
            HistoryStatus::Stopped => FormOutcome::Stopped,
            _ => FormOutcome::Skipped,
        }
    }
}

impl fmt::Display for HistoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一条历史记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub job_id: String,
    pub job_title: String,
    pub company: String,
    pub job_link: String,
    pub status: HistoryStatus,
    pub applied_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_item(item: &WorkItem, status: HistoryStatus) -> Self {
        Self {
            job_id: item.id.clone(),
            job_title: item.title.clone(),
            company: item.company.clone(),
            job_link: item.link.clone(),
            status,
            applied_at: Utc::now(),
        }
    }
}

/// 写入一条历史记录
///
/// 已存在的职位原位覆盖，新职位插到最前面，超出容量的旧记录被截掉。
pub fn upsert_bounded(history: &mut Vec<HistoryEntry>, entry: HistoryEntry, capacity: usize) {
    match history.iter().position(|e| e.job_id == entry.job_id) {
        Some(index) => history[index] = entry,
        None => history.insert(0, entry),
    }
    history.truncate(capacity);
}
