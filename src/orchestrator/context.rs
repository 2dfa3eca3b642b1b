//! 引擎上下文
//!
//! 调度器和控制器共享的全部依赖：页面、选择器、存储、运行信号、闸门和各个能力服务。
//! 上下文在进程内只创建一次，多次 start 之间复用（尝试次数账本也因此跨越多次启动）。

use crate::config::Settings;
use crate::models::ProfileData;
use crate::services::pacing::{self, Pacer, RunSignal, Stopped};
use crate::services::{
    AffordanceLocator, AppliedProbe, AttemptLedger, Catalog, ControlEvent, IdentityCheck,
    Notifier, PauseGate, RateLimitSentinel, Verifier,
};
use crate::store::Records;
use crate::surface::{PageSurface, SelectorSet};
use crate::workflow::ApplyFlow;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tracing::{debug, warn};

/// 可跳过的冷却倒计时
#[derive(Debug, Default)]
pub struct Cooldown {
    skip: Notify,
    active: AtomicBool,
}

impl Cooldown {
    /// 等待冷却结束，返回是否被跳过
    pub async fn wait(&self, signal: &RunSignal, duration: Duration) -> Result<bool, Stopped> {
        let notified = self.skip.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        self.active.store(true, Ordering::SeqCst);

        let result = tokio::select! {
            slept = pacing::sleep(signal, duration) => slept.map(|_| false),
            _ = &mut notified => signal.check().map(|_| true),
        };
        self.active.store(false, Ordering::SeqCst);
        result
    }

    /// 跳过正在进行的冷却，没有冷却时返回 `false`
    pub fn skip(&self) -> bool {
        if self.active.load(Ordering::SeqCst) {
            self.skip.notify_waiters();
            true
        } else {
            false
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// 引擎上下文
pub struct EngineContext<S: PageSurface + 'static> {
    pub surface: Arc<S>,
    pub selectors: Arc<SelectorSet>,
    pub records: Records,
    pub notifier: Notifier,
    pub signal: RunSignal,
    pub gate: PauseGate,
    pub sentinel: Arc<RateLimitSentinel>,
    pub probe: Arc<AppliedProbe>,
    pub catalog: Catalog,
    pub verifier: Verifier,
    pub affordance: AffordanceLocator,
    pub identity: IdentityCheck,
    pub attempts: AttemptLedger,
    pub cooldown: Cooldown,
    settings: watch::Sender<Settings>,
    profile: watch::Sender<ProfileData>,
}

impl<S: PageSurface + 'static> EngineContext<S> {
    pub fn new(
        surface: Arc<S>,
        selectors: SelectorSet,
        records: Records,
        settings: Settings,
    ) -> Result<Self> {
        let selectors = Arc::new(selectors);
        let notifier = Notifier::default();
        let signal = RunSignal::new();
        let gate = PauseGate::new(notifier.clone(), signal.clone());
        let probe = Arc::new(AppliedProbe::new(&selectors).context("已申请文案的正则无法编译")?);

        Ok(Self {
            catalog: Catalog::new(selectors.clone()),
            verifier: Verifier::new(&selectors, probe.clone()),
            affordance: AffordanceLocator::new(&selectors),
            identity: IdentityCheck::new(&selectors),
            sentinel: Arc::new(RateLimitSentinel::new(&selectors)),
            attempts: AttemptLedger::default(),
            cooldown: Cooldown::default(),
            settings: watch::channel(settings.normalized()).0,
            profile: watch::channel(ProfileData::default()).0,
            surface,
            selectors,
            records,
            notifier,
            signal,
            gate,
            probe,
        })
    }

    /// 当前设置（每个职位开始时读取一次，运行中的更新从下一个职位生效）
    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    pub fn update_settings(&self, settings: Settings) {
        self.settings.send_replace(settings.normalized());
    }

    pub fn profile(&self) -> ProfileData {
        self.profile.borrow().clone()
    }

    pub fn set_profile(&self, profile: ProfileData) {
        self.profile.send_replace(profile);
    }

    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.signal.clone())
    }

    /// 开始一次运行：打开运行信号、重置限流哨兵
    pub fn begin_run(&self) {
        self.signal.start();
        self.sentinel.arm();
    }

    /// 推送当前计数
    pub async fn publish_stats(&self) {
        match self.records.counters().await {
            Ok(counters) => self.notifier.emit(ControlEvent::StatsUpdated {
                applied: counters.applied,
                skipped: counters.skipped,
                failed: counters.failed,
                is_running: self.signal.is_running(),
            }),
            Err(e) => warn!("⚠️ 读取计数失败，本次不推送: {}", e),
        }
    }

    /// 为一个职位创建表单流程
    pub fn apply_flow(&self, settings: Settings) -> ApplyFlow {
        debug!("创建表单流程 (最多 {} 轮)", settings.form_max_iterations);
        ApplyFlow::new(
            self.selectors.clone(),
            self.sentinel.clone(),
            self.gate.clone(),
            self.notifier.clone(),
            self.pacer(),
            settings,
        )
    }
}
