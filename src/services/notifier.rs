//! 对外事件通知
//!
//! 控制端（UI / 命令行）通过订阅 broadcast 通道获得状态变化。

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// 提示级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// 对外事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlEvent {
    #[serde(rename_all = "camelCase")]
    StatsUpdated {
        applied: u64,
        skipped: u64,
        failed: u64,
        is_running: bool,
    },
    ManualPauseRequested {
        seconds: u64,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    ManualPauseCleared {
        is_running: bool,
    },
    RateLimitReached,
    /// 页面提示（例如“没有找到职位”）
    Notice {
        level: NoticeLevel,
        message: String,
    },
    /// 进入下一个职位前的冷却倒计时
    CooldownStarted {
        seconds: u64,
    },
}

/// 事件发送端
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: broadcast::Sender<ControlEvent>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.tx.subscribe()
    }

    /// 发送事件，没有订阅者时直接丢弃
    pub fn emit(&self, event: ControlEvent) {
        debug!("📣 事件: {:?}", event);
        let _ = self.tx.send(event);
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(ControlEvent::Notice {
            level,
            message: message.into(),
        });
    }
}
