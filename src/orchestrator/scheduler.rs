//! 会话调度器 - 编排层
//!
//! ## 职责
//!
//! 按目录顺序逐个处理职位，一次只处理一个：
//!
//! 1. 每处理若干个职位重新扫描一次列表
//! 2. 跳过已处理的职位；尝试次数用完的职位直接记为跳过
//! 3. 单项计时，超时强制记为超时跳过
//! 4. 打开职位 → 身份确认 → 已申请检查 → 查找申请入口 → 表单流程 → 结果确认
//! 5. 把结果转换为职位终态、计数和历史记录
//! 6. 进入下一个职位前冷却（可跳过）；目录处理完后翻页
//!
//! 所有职位级错误都在这里被消化，只有平台限流会结束整个会话。
//!
//! ## 状态
//!
//! `SessionState` 只由调度器修改，表单流程只读用户资料，不接触会话状态。

use crate::config::{Settings, UnverifiedPolicy};
use crate::error::{ItemError, SessionError};
use crate::models::{
    CounterKind, FormOutcome, HistoryEntry, HistoryStatus, ItemStatus, ProfileData, RunCounters,
    WorkItem,
};
use crate::orchestrator::context::EngineContext;
use crate::services::pacing::{ItemDeadline, Pacer, Stopped};
use crate::services::{ControlEvent, NoticeLevel, PauseDecision, Verification, WorkCatalog};
use crate::surface::{Criteria, PageSurface, HAD_AFFORDANCE_ATTR, STATUS_ATTR};
use crate::workflow::{dismiss_step_surface, FormSession};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 点击打开详情后等待详情出现的时间
const OPEN_WAIT: Duration = Duration::from_millis(2500);
/// 点击申请入口后等待表单出现的时间
const MODAL_WAIT: Duration = Duration::from_secs(4);

/// 会话状态
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// 当前目录中的下标
    pub current_index: usize,
    /// 当前页码（从 1 开始）
    pub current_page: u32,
    /// 本次运行的计数
    pub counters: RunCounters,
    /// 已进入终态的职位ID（本次运行）
    pub processed: HashSet<String>,
    /// 正在处理的职位（任意时刻最多一个）
    pub in_flight: Option<String>,
    /// 上次扫描以来处理过的职位数
    pub since_rescan: usize,
}

/// 会话结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// 所有页面都处理完毕
    Completed,
    /// 被外部停止或暂停
    Stopped,
}

/// 会话摘要
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub counters: RunCounters,
    pub pages: u32,
    pub processed: usize,
    pub end: SessionEnd,
}

/// 主循环的中断原因
enum Halt {
    Stopped,
    Fatal(SessionError),
}

impl From<Stopped> for Halt {
    fn from(_: Stopped) -> Self {
        Halt::Stopped
    }
}

impl From<SessionError> for Halt {
    fn from(err: SessionError) -> Self {
        Halt::Fatal(err)
    }
}

/// 会话调度器
pub struct Scheduler<S: PageSurface + 'static> {
    ctx: Arc<EngineContext<S>>,
    profile: ProfileData,
    pacer: Pacer,
    state: SessionState,
    catalog: WorkCatalog,
}

impl<S: PageSurface + 'static> Scheduler<S> {
    pub fn new(ctx: Arc<EngineContext<S>>, profile: ProfileData) -> Self {
        let pacer = ctx.pacer();
        Self {
            ctx,
            profile,
            pacer,
            state: SessionState {
                current_page: 1,
                ..Default::default()
            },
            catalog: WorkCatalog::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// 运行一次会话，直到处理完所有页面、被停止或遇到限流
    pub async fn run(mut self) -> Result<SessionSummary, SessionError> {
        let result = self.run_session().await;

        let was_running = self.ctx.signal.stop();
        self.ctx.publish_stats().await;

        let summary = SessionSummary {
            counters: self.state.counters,
            pages: self.state.current_page,
            processed: self.state.processed.len(),
            end: SessionEnd::Completed,
        };
        match result {
            Ok(()) => {
                info!("🏁 所有页面处理完毕");
                if was_running {
                    self.ctx.notifier.notice(NoticeLevel::Success, "All pages processed");
                }
                Ok(summary)
            }
            Err(Halt::Stopped) => {
                info!("⏹️ 会话已停止");
                Ok(SessionSummary {
                    end: SessionEnd::Stopped,
                    ..summary
                })
            }
            Err(Halt::Fatal(e)) => {
                error!("❌ 会话终止: {}", e);
                Err(e)
            }
        }
    }

    async fn run_session(&mut self) -> Result<(), Halt> {
        let settings = self.ctx.settings();
        self.pacer
            .between(settings.delay_min_ms, settings.delay_max_ms)
            .await?;
        self.ctx.catalog.auto_scroll(&*self.ctx.surface, &self.pacer).await?;

        self.catalog = self
            .ctx
            .catalog
            .discover(&*self.ctx.surface, &self.state.processed, self.state.current_page)
            .await
            .map_err(SessionError::from)?;

        if self.catalog.is_empty() {
            warn!("⚠️ 当前页面没有找到职位");
            self.ctx
                .notifier
                .notice(NoticeLevel::Error, "No jobs found on this page.");
            return Err(SessionError::NoWorkItemsFound.into());
        }

        self.ctx.notifier.notice(
            NoticeLevel::Info,
            format!("Starting: {} jobs found", self.catalog.len()),
        );
        self.ctx.publish_stats().await;

        loop {
            self.pacer.check()?;
            let settings = self.ctx.settings();

            if self.state.current_index >= self.catalog.len() {
                if self.next_page().await? {
                    continue;
                }
                return Ok(());
            }

            if self.state.since_rescan >= settings.rescan_every {
                self.rescan().await?;
                continue;
            }

            let Some(mut item) = self.catalog.get(self.state.current_index).cloned() else {
                self.state.current_index += 1;
                continue;
            };

            if self.state.processed.contains(&item.id) {
                debug!("[职位 {}] 已处理过，跳过", item.id);
                self.state.current_index += 1;
                continue;
            }

            if !self.process(&mut item, &settings).await? {
                continue;
            }

            if self.ctx.sentinel.has_fired() {
                return Err(SessionError::RateLimitDetected.into());
            }
            self.pacer.check()?;

            self.state.current_index += 1;
            self.state.since_rescan += 1;
            self.cool_down(&settings).await?;
        }
    }

    /// 处理一个职位，返回 `false` 表示需要重试当前职位
    async fn process(&mut self, item: &mut WorkItem, settings: &Settings) -> Result<bool, Halt> {
        let previous = self.ctx.attempts.attempts(&item.id);
        item.record_attempt(previous);
        if previous >= settings.max_attempts {
            let err = ItemError::AttemptLimitExceeded {
                id: item.id.clone(),
                max: settings.max_attempts,
            };
            warn!("[职位 {}] ⚠️ {}", item.id, err);
            self.finalize(item, err.history_status()).await;
            return Ok(true);
        }

        let attempt = self.ctx.attempts.record(&item.id);
        item.record_attempt(attempt);
        info!(
            "[职位 {}] 🧾 {} @ {} (第 {}/{} 次尝试)",
            item.id, item.title, item.company, attempt, settings.max_attempts
        );

        if let Err(e) = self.ctx.surface.scroll_into_view(&item.source_ref).await {
            debug!("[职位 {}] 滚动到卡片失败: {}", item.id, e);
        }
        self.state.in_flight = Some(item.id.clone());
        item.status = ItemStatus::Processing;
        self.mark(item, ItemStatus::Processing).await;

        let deadline = ItemDeadline::start(settings.per_item_timeout());
        let result = tokio::select! {
            result = self.attempt(item, settings, &deadline) => result,
            _ = deadline.elapsed() => {
                let seconds = deadline.budget().as_secs();
                warn!("[职位 {}] ⏱️ 超过 {} 秒未完成，强制跳过", item.id, seconds);
                if self.ctx.gate.is_pending() {
                    self.ctx.gate.resolve(PauseDecision::Cancel);
                }
                dismiss_step_surface(&*self.ctx.surface, &self.ctx.selectors).await;
                Err(ItemError::Deadline { seconds })
            }
        };
        self.state.in_flight = None;

        let status = match result {
            Ok(status) => status,
            Err(e) if e.is_retryable() && attempt < settings.max_attempts && !self.ctx.sentinel.has_fired() => {
                warn!("[职位 {}] ⚠️ 页面操作失败，稍后重试: {}", item.id, e);
                self.clear_mark(item).await;
                self.pacer.between(1000, 2000).await?;
                return Ok(false);
            }
            Err(e) => {
                if e.is_session_fatal() {
                    warn!("[职位 {}] ⛔ {}", item.id, e);
                } else {
                    info!("[职位 {}] ⏭️ {}", item.id, e);
                }
                e.history_status()
            }
        };

        self.finalize(item, status).await;
        Ok(true)
    }

    /// 一次完整的申请尝试
    async fn attempt(
        &self,
        item: &WorkItem,
        settings: &Settings,
        deadline: &ItemDeadline,
    ) -> Result<HistoryStatus, ItemError> {
        let surface = &*self.ctx.surface;
        let card = &item.source_ref;

        self.open(item).await?;
        self.pacer.between(2500, 4000).await?;

        self.ctx
            .identity
            .confirm(surface, &item.id, settings.identity_timeout(), &self.pacer)
            .await?;

        if self.ctx.probe.is_already_applied(surface, Some(card)).await? {
            info!("[职位 {}] ✓ 已经申请过", item.id);
            return Ok(HistoryStatus::AlreadyApplied);
        }

        self.pacer.between(1000, 1500).await?;
        let Some(button) = self.ctx.affordance.locate(surface, Some(card)).await? else {
            return Err(ItemError::NoTarget);
        };

        if let Err(e) = surface.set_attr(card, HAD_AFFORDANCE_ATTR, Some("true")).await {
            debug!("[职位 {}] 记录申请入口失败: {}", item.id, e);
        }
        info!("[职位 {}] 🪄 点击申请", item.id);
        surface.click(&button).await?;
        self.pacer.between(2000, 3500).await?;

        let probe = Criteria::css(&self.ctx.selectors.modal_open_probe);
        if surface.wait_for_any(&[probe], MODAL_WAIT).await?.is_none() {
            return Err(ItemError::ElementTimeout {
                what: "申请表单",
                waited_ms: MODAL_WAIT.as_millis() as u64,
            });
        }

        let mut session = FormSession::new(&item.id, true);
        let flow = self.ctx.apply_flow(settings.clone());
        let outcome = flow.run(surface, &mut session, &self.profile, deadline).await?;
        debug!("{} 表单结束: {:?}", session, outcome);

        match outcome {
            FormOutcome::Applied => self.confirm_applied(item, &session, settings).await,
            FormOutcome::Skipped => Ok(HistoryStatus::Skipped),
            FormOutcome::Failed => Ok(HistoryStatus::Failed),
            FormOutcome::Stopped => Err(ItemError::Interrupted),
        }
    }

    /// 打开职位详情：先点卡片内的链接，再点卡片本身，最后直接打开职位链接
    async fn open(&self, item: &WorkItem) -> Result<(), ItemError> {
        let surface = &*self.ctx.surface;
        let card = &item.source_ref;
        let ready = [Criteria::css(&self.ctx.selectors.detail_ready)];

        for selector in &self.ctx.selectors.card_click_targets {
            let Some(target) = surface.find_first(&Criteria::css(selector).within(card)).await? else {
                continue;
            };
            debug!("[职位 {}] 点击 {}", item.id, selector);
            if let Err(e) = surface.click(&target).await {
                debug!("[职位 {}] 点击 {} 失败: {}", item.id, selector, e);
                continue;
            }
            self.pacer.between(250, 500).await?;
            if surface.wait_for_any(&ready, OPEN_WAIT).await?.is_some() {
                return Ok(());
            }
        }

        debug!("[职位 {}] 点击卡片本身", item.id);
        if let Err(e) = surface.click(card).await {
            debug!("[职位 {}] 点击卡片失败: {}", item.id, e);
        }
        self.pacer.between(300, 600).await?;
        if surface
            .wait_for_any(&ready, Duration::from_secs(2))
            .await?
            .is_some()
        {
            return Ok(());
        }

        info!("[职位 {}] 🔗 直接打开职位链接: {}", item.id, item.link);
        surface.navigate(&item.link).await?;
        Ok(())
    }

    /// 表单关闭后确认提交结果
    async fn confirm_applied(
        &self,
        item: &WorkItem,
        session: &FormSession,
        settings: &Settings,
    ) -> Result<HistoryStatus, ItemError> {
        let surface = &*self.ctx.surface;
        let card = &item.source_ref;
        let had_affordance = session.had_affordance
            || matches!(
                surface.attr(card, HAD_AFFORDANCE_ATTR).await,
                Ok(Some(ref v)) if v == "true"
            );

        let verification = self
            .ctx
            .verifier
            .verify(
                surface,
                Some(card),
                had_affordance,
                settings.verify_timeout(),
                settings.verify_interval(),
                &self.pacer,
            )
            .await?;

        Ok(match verification {
            Verification::Confirmed(_) => HistoryStatus::Applied,
            Verification::Rejected => HistoryStatus::Failed,
            Verification::Unverified => match settings.unverified_policy {
                UnverifiedPolicy::AssumeApplied => {
                    warn!("[职位 {}] ⚠️ 无法确认提交结果，按已申请处理", item.id);
                    HistoryStatus::Applied
                }
                UnverifiedPolicy::TreatAsFailed => {
                    warn!("[职位 {}] ⚠️ 无法确认提交结果，记为失败", item.id);
                    HistoryStatus::Failed
                }
            },
        })
    }

    /// 记录终态：卡片标记、计数、历史记录
    async fn finalize(&mut self, item: &mut WorkItem, status: HistoryStatus) {
        let outcome = status.outcome();
        item.status = outcome.item_status();

        if outcome != FormOutcome::Stopped {
            self.state.processed.insert(item.id.clone());
        }
        if !self.ctx.sentinel.has_fired() {
            // 已申请过的卡片按“已申请”标记，计数仍算跳过
            let marker = match status {
                HistoryStatus::AlreadyApplied => ItemStatus::Applied,
                _ => item.status,
            };
            self.mark(item, marker).await;
        }

        info!("[职位 {}] 📌 结果: {}", item.id, status);
        if let Err(e) = self
            .ctx
            .records
            .record_history(HistoryEntry::from_item(item, status))
            .await
        {
            warn!("[职位 {}] ⚠️ 写入历史记录失败: {}", item.id, e);
        }

        if let Some(kind) = CounterKind::for_outcome(outcome) {
            self.state.counters.bump(kind);
            if let Err(e) = self.ctx.records.bump(kind).await {
                warn!("[职位 {}] ⚠️ 更新计数失败: {}", item.id, e);
            }
        }
        self.ctx.publish_stats().await;
    }

    async fn mark(&self, item: &WorkItem, status: ItemStatus) {
        if let Err(e) = self
            .ctx
            .surface
            .set_attr(&item.source_ref, STATUS_ATTR, Some(status.marker()))
            .await
        {
            debug!("[职位 {}] 更新卡片标记失败: {}", item.id, e);
        }
    }

    async fn clear_mark(&self, item: &WorkItem) {
        if let Err(e) = self
            .ctx
            .surface
            .set_attr(&item.source_ref, STATUS_ATTR, None)
            .await
        {
            debug!("[职位 {}] 清除卡片标记失败: {}", item.id, e);
        }
    }

    /// 进入下一个职位前的冷却
    async fn cool_down(&self, settings: &Settings) -> Result<(), Stopped> {
        let seconds = settings.cooldown_secs;
        if seconds == 0 {
            return Ok(());
        }
        self.ctx.notifier.emit(ControlEvent::CooldownStarted { seconds });
        debug!("⏳ 冷却 {} 秒", seconds);
        if self.ctx.cooldown.wait(&self.ctx.signal, settings.cooldown()).await? {
            info!("⏭️ 跳过等待");
        }
        Ok(())
    }

    /// 重新扫描当前页（只会减少未处理的职位，不会重新引入已处理的）
    async fn rescan(&mut self) -> Result<(), Stopped> {
        info!("🔄 重新扫描职位列表");
        self.ctx.catalog.auto_scroll(&*self.ctx.surface, &self.pacer).await?;
        match self
            .ctx
            .catalog
            .discover(&*self.ctx.surface, &self.state.processed, self.state.current_page)
            .await
        {
            Ok(catalog) => {
                self.catalog = catalog;
                self.state.current_index = 0;
            }
            Err(e) => warn!("⚠️ 重新扫描失败，继续使用原列表: {}", e),
        }
        self.state.since_rescan = 0;
        Ok(())
    }

    /// 翻到下一页，没有下一页时返回 `false`
    async fn next_page(&mut self) -> Result<bool, Stopped> {
        let surface = &*self.ctx.surface;
        let next = Criteria::css(&self.ctx.selectors.next_page).enabled();

        let button = match surface.find_first(&next).await {
            Ok(Some(button)) => button,
            Ok(None) => {
                debug!("没有可用的下一页按钮");
                return Ok(false);
            }
            Err(e) => {
                warn!("⚠️ 查找下一页按钮失败: {}", e);
                return Ok(false);
            }
        };

        info!("➡️ 翻到第 {} 页", self.state.current_page + 1);
        if let Err(e) = surface.click(&button).await {
            warn!("⚠️ 点击下一页失败: {}", e);
            return Ok(false);
        }
        self.state.current_page += 1;
        self.pacer.between(4000, 6000).await?;
        self.ctx.catalog.auto_scroll(surface, &self.pacer).await?;

        self.catalog = match self
            .ctx
            .catalog
            .discover(surface, &self.state.processed, self.state.current_page)
            .await
        {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("⚠️ 第 {} 页扫描失败: {}", self.state.current_page, e);
                return Ok(false);
            }
        };
        self.state.current_index = 0;
        self.state.since_rescan = 0;
        Ok(true)
    }
}
