//! 表单流程 - 流程层
//!
//! 核心职责：定义“一个职位的申请表单”的完整处理流程
//!
//! 每一轮：
//! 1. 找到当前表单步骤（找不到视为无需填写，跳过）
//! 2. 按用户资料填写空字段
//! 3. 限流检查（优先于其他所有逻辑）
//! 4. 表单已关闭 → 已提交
//! 5. 优先点击“提交”，其次“下一步”；按钮禁用或有校验错误时转人工处理
//!
//! 超过最大轮次仍未完成记为失败（不是跳过），便于区分“无法收敛”的表单。

use crate::config::Settings;
use crate::error::ItemError;
use crate::models::{FormOutcome, ProfileData};
use crate::services::field_filler::{apply_fills, has_unanswered_required, plan_fills};
use crate::services::manual_pause::{PauseGate, PauseResolution};
use crate::services::notifier::Notifier;
use crate::services::pacing::{ItemDeadline, Pacer};
use crate::services::rate_limit::RateLimitSentinel;
use crate::surface::{Criteria, ElementRef, PageSurface, SelectorSet};
use crate::workflow::form_session::FormSession;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// 提交按钮文字（优先）
pub const SUBMIT_LABELS: &[&str] = &["submit application", "submit"];
/// 下一步按钮文字
pub const NEXT_LABELS: &[&str] = &["next", "review", "continue"];
/// 提交后的确认类按钮文字
pub const DONE_LABELS: &[&str] = &[
    "done",
    "close",
    "dismiss",
    "finish",
    "got it",
    "all done",
    "completed",
    "finished",
];

const DONE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// 一次推进尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    /// 表单已关闭
    Submitted,
    /// 点击了“下一步”
    Advanced,
    /// 没有可点击的按钮，等待下一轮
    Waiting,
    /// 确认框在等待时间内没有关闭
    Unacknowledged,
    /// 需要人工处理（原因）
    ManualPause(&'static str),
}

/// 关闭当前表单（找不到关闭按钮时什么都不做）
pub async fn dismiss_step_surface<S: PageSurface + ?Sized>(surface: &S, selectors: &SelectorSet) {
    match surface.find_first(&selectors.dismiss()).await {
        Ok(Some(button)) => {
            if let Err(e) = surface.click(&button).await {
                debug!("关闭表单失败: {}", e);
            }
        }
        Ok(None) => {}
        Err(e) => debug!("查找关闭按钮失败: {}", e),
    }
}

/// 表单流程
///
/// - 编排一个职位表单的完整处理流程
/// - 决定何时填写、何时点击、何时转人工
/// - 不持有页面（由调用方传入）
pub struct ApplyFlow {
    selectors: Arc<SelectorSet>,
    sentinel: Arc<RateLimitSentinel>,
    gate: PauseGate,
    notifier: Notifier,
    pacer: Pacer,
    settings: Settings,
}

impl ApplyFlow {
    pub fn new(
        selectors: Arc<SelectorSet>,
        sentinel: Arc<RateLimitSentinel>,
        gate: PauseGate,
        notifier: Notifier,
        pacer: Pacer,
        settings: Settings,
    ) -> Self {
        Self {
            selectors,
            sentinel,
            gate,
            notifier,
            pacer,
            settings,
        }
    }

    /// 运行表单流程，结果同时记录在 `session.outcome`
    pub async fn run<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        session: &mut FormSession,
        profile: &ProfileData,
        deadline: &ItemDeadline,
    ) -> Result<FormOutcome, ItemError> {
        let result = self.drive(surface, session, profile, deadline).await;
        session.outcome = Some(match &result {
            Ok(outcome) => *outcome,
            Err(e) => e.history_status().outcome(),
        });
        result
    }

    async fn drive<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        session: &mut FormSession,
        profile: &ProfileData,
        deadline: &ItemDeadline,
    ) -> Result<FormOutcome, ItemError> {
        let id = session.item_id.clone();
        let max = self.settings.form_max_iterations;

        while session.iterations < max {
            self.pacer.check()?;

            let Some(step) = self.find_step(surface).await? else {
                info!("[职位 {}] ⏭️ 表单没有出现，跳过", id);
                return Ok(FormOutcome::Skipped);
            };
            session.step = Some(step.clone());

            let fields = surface.form_fields(&step).await?;
            let plan = plan_fills(&fields, profile, &session.filled);
            let filled = apply_fills(surface, &plan).await?;
            if filled > 0 {
                info!("[职位 {}] ✏️ 填写了 {} 个字段", id, filled);
            }
            session.filled.extend(plan.into_iter().map(|fill| fill.key));
            self.pacer.between(1200, 2000).await?;

            self.check_limit(surface).await?;

            let Some(step) = self.current_step(surface).await? else {
                info!("[职位 {}] ✅ 申请已提交", id);
                return Ok(FormOutcome::Applied);
            };
            session.step = Some(step.clone());

            match self.progress(surface, &step).await? {
                Progress::Submitted => return Ok(FormOutcome::Applied),
                Progress::Unacknowledged => {
                    warn!("[职位 {}] ⏱️ 确认框未在时限内关闭，记为失败", id);
                    dismiss_step_surface(surface, &self.selectors).await;
                    return Ok(FormOutcome::Failed);
                }
                Progress::Advanced | Progress::Waiting => self.pacer.between(800, 1200).await?,
                Progress::ManualPause(reason) => {
                    warn!("[职位 {}] ⏸️ 需要人工处理: {}", id, reason);
                    match self.manual_pause(reason, deadline).await {
                        PauseResolution::Resume => info!("[职位 {}] ▶️ 继续", id),
                        PauseResolution::Skip => {
                            info!("[职位 {}] ⏭️ 用户选择跳过", id);
                            dismiss_step_surface(surface, &self.selectors).await;
                            return Ok(FormOutcome::Skipped);
                        }
                        PauseResolution::TimedOut => {
                            dismiss_step_surface(surface, &self.selectors).await;
                            return Err(ItemError::ManualPauseTimeout);
                        }
                        PauseResolution::Cancel => {
                            self.pacer.check()?;
                            dismiss_step_surface(surface, &self.selectors).await;
                            return Err(ItemError::ManualPauseCancelled);
                        }
                    }
                }
            }

            session.iterations += 1;
            debug!("{} 进入下一轮", session);
        }

        warn!("[职位 {}] ⚠️ {} 轮内未能完成表单", id, max);
        dismiss_step_surface(surface, &self.selectors).await;
        Err(ItemError::FormConvergence { iterations: max })
    }

    /// 查找表单步骤，第一次没找到时稍等再找一次
    async fn find_step<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
    ) -> Result<Option<ElementRef>, ItemError> {
        if let Some(step) = self.current_step(surface).await? {
            return Ok(Some(step));
        }
        self.pacer.between(500, 1000).await?;
        self.current_step(surface).await
    }

    async fn current_step<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
    ) -> Result<Option<ElementRef>, ItemError> {
        Ok(surface.find_first(&self.selectors.step_surface()).await?)
    }

    /// 限流检查，触发时停止整个会话
    async fn check_limit<S: PageSurface + ?Sized>(&self, surface: &S) -> Result<(), ItemError> {
        if self.sentinel.detect(surface).await? {
            self.sentinel
                .trip(surface, self.pacer.signal(), &self.gate, &self.notifier)
                .await;
            dismiss_step_surface(surface, &self.selectors).await;
            return Err(ItemError::RateLimitDetected);
        }
        Ok(())
    }

    async fn find_button<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        step: &ElementRef,
        labels: &[&str],
    ) -> Result<Option<ElementRef>, ItemError> {
        let criteria = Criteria::css(&self.selectors.step_buttons)
            .within(step)
            .with_text(labels);
        Ok(surface.find_first(&criteria).await?)
    }

    async fn has_blocking_errors<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        step: &ElementRef,
    ) -> Result<bool, ItemError> {
        let inline = Criteria::css(&self.selectors.error_markers).within(step);
        if surface.find_first(&inline).await?.is_some() {
            return Ok(true);
        }
        let toast = Criteria::css(&self.selectors.error_toast);
        Ok(surface.find_first(&toast).await?.is_some())
    }

    async fn needs_attention<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        step: &ElementRef,
    ) -> Result<bool, ItemError> {
        if self.has_blocking_errors(surface, step).await? {
            return Ok(true);
        }
        Ok(has_unanswered_required(&surface.form_fields(step).await?))
    }

    /// 尝试推进一步：优先提交，其次下一步
    async fn progress<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        step: &ElementRef,
    ) -> Result<Progress, ItemError> {
        if has_unanswered_required(&surface.form_fields(step).await?) {
            return Ok(Progress::ManualPause("formIncomplete"));
        }

        if let Some(submit) = self.find_button(surface, step, SUBMIT_LABELS).await? {
            if surface.is_disabled(&submit).await? {
                return Ok(Progress::ManualPause("submitDisabled"));
            }
            info!("📨 点击提交");
            surface.click(&submit).await?;
            return self.after_click(surface, false).await;
        }

        if let Some(next) = self.find_button(surface, step, NEXT_LABELS).await? {
            if surface.is_disabled(&next).await? {
                return Ok(Progress::ManualPause("nextDisabled"));
            }
            debug!("➡️ 点击下一步");
            surface.click(&next).await?;
            self.pacer.between(800, 1200).await?;

            if let Some(step_now) = self.current_step(surface).await? {
                if self.has_blocking_errors(surface, &step_now).await? {
                    return Ok(Progress::ManualPause("validationError"));
                }
            }
            return self.after_click(surface, true).await;
        }

        self.check_limit(surface).await?;

        if self.needs_attention(surface, step).await? {
            return Ok(Progress::ManualPause("validationError"));
        }
        Ok(Progress::Waiting)
    }

    /// 点击后的判定
    async fn after_click<S: PageSurface + ?Sized>(
        &self,
        surface: &S,
        allow_continue: bool,
    ) -> Result<Progress, ItemError> {
        self.pacer.between(1500, 2500).await?;
        self.check_limit(surface).await?;

        let Some(step) = self.current_step(surface).await? else {
            info!("✅ 表单已关闭，申请已提交");
            self.pacer.between(1500, 2500).await?;
            return Ok(Progress::Submitted);
        };

        let done = Criteria::css(&self.selectors.step_buttons)
            .within(&step)
            .with_text(DONE_LABELS);
        if surface.find_first(&done).await?.is_some() {
            info!("⏳ 等待确认框关闭 (最多 {} 秒)", self.settings.done_wait_secs);
            if self.wait_step_closed(surface).await? {
                info!("✅ 确认框已关闭");
                self.pacer.between(1500, 2500).await?;
                return Ok(Progress::Submitted);
            }
            return Ok(Progress::Unacknowledged);
        }

        if self.needs_attention(surface, &step).await? {
            return Ok(Progress::ManualPause("validationError"));
        }

        Ok(if allow_continue {
            Progress::Advanced
        } else {
            Progress::Waiting
        })
    }

    async fn wait_step_closed<S: PageSurface + ?Sized>(&self, surface: &S) -> Result<bool, ItemError> {
        let started = Instant::now();
        let limit = self.settings.done_wait();
        loop {
            if self.current_step(surface).await?.is_none() {
                return Ok(true);
            }
            if started.elapsed() >= limit {
                return Ok(false);
            }
            self.pacer.fixed(DONE_POLL_INTERVAL).await?;
        }
    }

    /// 人工处理期间单项计时暂停
    async fn manual_pause(&self, reason: &str, deadline: &ItemDeadline) -> PauseResolution {
        let _suspended = deadline.suspend();
        let ticket = self.gate.open(self.settings.manual_pause(), reason);
        debug!("✋ 等待人工处理（{}），最多 {} 秒", reason, ticket.deadline().as_secs());
        ticket.wait().await
    }
}
