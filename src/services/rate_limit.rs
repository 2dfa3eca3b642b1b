//! 限流哨兵（Rate-Limit Sentinel）
//!
//! 在提示区域和当前表单中查找平台限流文案。触发后整个会话停止，且只处理一次。

use crate::error::SurfaceResult;
use crate::services::manual_pause::{PauseDecision, PauseGate};
use crate::services::notifier::{ControlEvent, Notifier};
use crate::services::pacing::RunSignal;
use crate::surface::{Criteria, PageSurface, SelectorSet, STATUS_ATTR};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// 限流文案（小写子串匹配）
pub const LIMIT_PHRASES: [&str; 5] = [
    "reached the maximum number of job applications",
    "hit a limit",
    "maximum number of linkedin job applications",
    "please wait before applying again",
    "try again later",
];

pub struct RateLimitSentinel {
    toast: Criteria,
    step_surface: Criteria,
    notified: AtomicBool,
}

impl RateLimitSentinel {
    pub fn new(selectors: &SelectorSet) -> Self {
        Self {
            toast: Criteria::css(&selectors.toast_message),
            step_surface: selectors.step_surface(),
            notified: AtomicBool::new(false),
        }
    }

    pub fn matches_text(text: &str) -> bool {
        let lowered = text.to_lowercase();
        LIMIT_PHRASES.iter().any(|phrase| lowered.contains(phrase))
    }

    /// 检查提示区域和当前表单
    pub async fn detect<S: PageSurface + ?Sized>(&self, surface: &S) -> SurfaceResult<bool> {
        for criteria in [&self.toast, &self.step_surface] {
            if let Some(element) = surface.find_first(criteria).await? {
                let text = crate::surface::text_or_empty(surface, &element).await;
                if Self::matches_text(&text) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// 每次启动时重置
    pub fn arm(&self) {
        self.notified.store(false, Ordering::SeqCst);
    }

    /// 本次运行中是否已经触发
    pub fn has_fired(&self) -> bool {
        self.notified.load(Ordering::SeqCst)
    }

    /// 执行限流处理：停止运行、取消人工介入、清理页面标记、通知控制端
    ///
    /// 已停止或已触发过时不做任何事，返回 `false`。
    pub async fn trip<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        signal: &RunSignal,
        gate: &PauseGate,
        notifier: &Notifier,
    ) -> bool {
        if !signal.is_running() || self.notified.swap(true, Ordering::SeqCst) {
            return false;
        }

        warn!("⛔ 检测到平台限流，停止自动申请");
        signal.stop();
        gate.resolve(PauseDecision::Cancel);
        if let Err(e) = surface.clear_marks(STATUS_ATTR).await {
            debug!("清理页面标记失败: {}", e);
        }
        notifier.emit(ControlEvent::RateLimitReached);
        true
    }
}
