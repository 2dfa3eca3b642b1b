use crate::models::work_item::FormOutcome;
use serde::{Deserialize, Serialize};

/// 计数器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    Applied,
    Skipped,
    Failed,
}

impl CounterKind {
    /// 处理结果对应的计数器，`Stopped` 不计数
    pub fn for_outcome(outcome: FormOutcome) -> Option<Self> {
        match outcome {
            FormOutcome::Applied => Some(CounterKind::Applied),
            FormOutcome::Skipped => Some(CounterKind::Skipped),
            FormOutcome::Failed => Some(CounterKind::Failed),
            FormOutcome::Stopped => None,
        }
    }
}

/// 运行计数器
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl RunCounters {
    pub fn bump(&mut self, kind: CounterKind) {
        match kind {
            CounterKind::Applied => self.applied += 1,
            CounterKind::Skipped => self.skipped += 1,
            CounterKind::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.applied + self.skipped + self.failed
    }
}
