//! 职位（工作项）模型

use crate::surface::ElementRef;
use serde::{Deserialize, Serialize};

/// 职位状态
///
/// `Discovered` → `Processing` → 终态之一。职位不会被删除，只会被标记为终态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Discovered,
    Processing,
    Applied,
    Skipped,
    Failed,
    Stopped,
}

impl ItemStatus {
    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemStatus::Discovered | ItemStatus::Processing)
    }

    /// 写到卡片上的状态标记
    pub fn marker(self) -> &'static str {
        match self {
            ItemStatus::Discovered => "discovered",
            ItemStatus::Processing => "processing",
            ItemStatus::Applied => "applied",
            ItemStatus::Skipped => "skipped",
            ItemStatus::Failed => "failed",
            ItemStatus::Stopped => "stopped",
        }
    }
}

/// 一次申请尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormOutcome {
    Applied,
    Skipped,
    Failed,
    Stopped,
}

impl FormOutcome {
    /// 对应的职位终态
    pub fn item_status(self) -> ItemStatus {
        match self {
            FormOutcome::Applied => ItemStatus::Applied,
            FormOutcome::Skipped => ItemStatus::Skipped,
            FormOutcome::Failed => ItemStatus::Failed,
            FormOutcome::Stopped => ItemStatus::Stopped,
        }
    }
}

/// 列表页上发现的一个职位
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    /// 职位ID（去重键）
    pub id: String,
    /// 职位名称
    pub title: String,
    /// 公司名称
    pub company: String,
    /// 职位链接（不含查询参数）
    pub link: String,
    /// 指回列表中原始卡片的元素引用
    pub source_ref: ElementRef,
    /// 已尝试次数
    pub attempt_count: u32,
    /// 当前状态
    pub status: ItemStatus,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, source_ref: ElementRef) -> Self {
        let id = id.into();
        Self {
            link: format!("https://www.linkedin.com/jobs/view/{}/", id),
            id,
            title: "Unknown Position".to_string(),
            company: "Unknown Company".to_string(),
            source_ref,
            attempt_count: 0,
            status: ItemStatus::Discovered,
        }
    }

    /// 记录尝试次数，只增不减
    pub fn record_attempt(&mut self, attempts: u32) {
        self.attempt_count = self.attempt_count.max(attempts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_count_never_decreases() {
        let mut item = WorkItem::new("4012345678", ElementRef::new("n1"));
        item.record_attempt(2);
        item.record_attempt(1);
        assert_eq!(item.attempt_count, 2);
    }

    #[test]
    fn test_outcome_maps_to_terminal_status() {
        for outcome in [
            FormOutcome::Applied,
            FormOutcome::Skipped,
            FormOutcome::Failed,
            FormOutcome::Stopped,
        ] {
            assert!(outcome.item_status().is_terminal());
        }
        assert!(!ItemStatus::Processing.is_terminal());
    }
}
