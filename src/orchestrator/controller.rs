//! 控制器 - 控制协议
//!
//! ## 职责
//!
//! - 接收外部命令（start / stop / pause / resume / skip / updateSettings / reset）
//! - 每个命令都返回一个确认状态
//! - 启动时在后台任务中运行调度器，同一时刻最多一个会话
//! - 事件通过 `Notifier` 的 broadcast 通道推送给控制端

use crate::config::Settings;
use crate::error::SessionError;
use crate::models::ProfileData;
use crate::orchestrator::context::EngineContext;
use crate::orchestrator::scheduler::{Scheduler, SessionSummary};
use crate::services::{ControlEvent, PauseDecision};
use crate::surface::{PageSurface, STATUS_ATTR};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 外部命令
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlCommand {
    /// 开始运行；缺省的资料和设置使用存储中的值
    Start {
        #[serde(default, alias = "userData")]
        profile: Option<ProfileData>,
        #[serde(default)]
        settings: Option<Settings>,
    },
    Stop,
    /// 停止处理但保留页面上的标记
    Pause,
    /// 人工处理完成，继续当前职位
    Resume,
    /// 跳过当前人工处理的职位，或跳过冷却等待
    Skip,
    UpdateSettings {
        settings: Settings,
    },
    /// 清零累计计数并删除存储中的用户资料
    Reset,
}

/// 命令确认
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ack {
    Started,
    Stopped,
    Paused,
    Resumed,
    Skipped,
    Ok,
}

type SessionHandle = JoinHandle<Result<SessionSummary, SessionError>>;

/// 控制器
pub struct Controller<S: PageSurface + 'static> {
    ctx: Arc<EngineContext<S>>,
    session: Mutex<Option<SessionHandle>>,
}

impl<S: PageSurface + 'static> Controller<S> {
    pub fn new(ctx: Arc<EngineContext<S>>) -> Self {
        Self {
            ctx,
            session: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<EngineContext<S>> {
        &self.ctx
    }

    /// 订阅事件
    pub fn events(&self) -> broadcast::Receiver<ControlEvent> {
        self.ctx.notifier.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.ctx.signal.is_running()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<SessionHandle>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub async fn handle(&self, command: ControlCommand) -> Ack {
        debug!("收到命令: {:?}", command);
        match command {
            ControlCommand::Start { profile, settings } => self.start(profile, settings).await,
            ControlCommand::Stop => self.stop().await,
            ControlCommand::Pause => self.pause(),
            ControlCommand::Resume => self.resume(),
            ControlCommand::Skip => self.skip(),
            ControlCommand::UpdateSettings { settings } => self.update_settings(settings).await,
            ControlCommand::Reset => self.reset().await,
        }
    }

    pub async fn start(&self, profile: Option<ProfileData>, settings: Option<Settings>) -> Ack {
        let profile = match profile {
            Some(profile) => {
                if let Err(e) = self.ctx.records.save_profile(&profile).await {
                    warn!("⚠️ 保存用户资料失败: {}", e);
                }
                profile
            }
            None => self.stored_profile().await,
        };
        self.ctx.set_profile(profile.clone());

        if let Some(settings) = settings {
            self.update_settings(settings).await;
        }

        if self.ctx.signal.is_running() {
            info!("▶️ 已在运行中，资料和设置已更新");
            return Ack::Started;
        }

        // 上一个会话可能还在收尾
        if let Some(summary) = self.wait_session().await {
            debug!("上一个会话已结束: {:?}", summary.map(|s| s.end));
        }

        info!("▶️ 开始自动申请");
        self.ctx.begin_run();
        let scheduler = Scheduler::new(self.ctx.clone(), profile);
        *self.slot() = Some(tokio::spawn(scheduler.run()));
        Ack::Started
    }

    async fn stored_profile(&self) -> ProfileData {
        match self.ctx.records.profile().await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                warn!("⚠️ 没有用户资料，只会填写不需要资料的字段");
                ProfileData::default()
            }
            Err(e) => {
                warn!("⚠️ 读取用户资料失败: {}", e);
                ProfileData::default()
            }
        }
    }

    pub async fn stop(&self) -> Ack {
        if self.ctx.signal.stop() {
            info!("⏹️ 停止自动申请");
        }
        self.ctx.gate.resolve(PauseDecision::Cancel);
        if let Err(e) = self.ctx.surface.clear_marks(STATUS_ATTR).await {
            debug!("清理页面标记失败: {}", e);
        }
        self.ctx.publish_stats().await;
        Ack::Stopped
    }

    pub fn pause(&self) -> Ack {
        if self.ctx.signal.stop() {
            info!("⏸️ 暂停自动申请");
        }
        Ack::Paused
    }

    pub fn resume(&self) -> Ack {
        if self.ctx.gate.resolve(PauseDecision::Resume) {
            info!("▶️ 人工处理完成，继续");
        } else {
            debug!("没有等待中的人工处理");
        }
        Ack::Resumed
    }

    pub fn skip(&self) -> Ack {
        if self.ctx.gate.resolve(PauseDecision::Skip) {
            info!("⏭️ 跳过当前职位");
        } else if self.ctx.cooldown.skip() {
            info!("⏭️ 跳过等待");
        } else {
            debug!("没有可以跳过的等待");
        }
        Ack::Skipped
    }

    pub async fn update_settings(&self, settings: Settings) -> Ack {
        let settings = settings.normalized();
        if let Err(e) = self.ctx.records.save_settings(&settings).await {
            warn!("⚠️ 保存设置失败: {}", e);
        }
        self.ctx.update_settings(settings);
        info!("⚙️ 设置已更新");
        Ack::Ok
    }

    pub async fn reset(&self) -> Ack {
        if let Err(e) = self.ctx.records.reset_counters().await {
            warn!("⚠️ 清零计数失败: {}", e);
        }
        if let Err(e) = self.ctx.records.clear_profile().await {
            warn!("⚠️ 删除用户资料失败: {}", e);
        }
        self.ctx.set_profile(ProfileData::default());
        info!("🧹 计数和用户资料已清除");
        self.ctx.publish_stats().await;
        Ack::Ok
    }

    /// 等待当前会话结束，没有会话时返回 `None`
    pub async fn wait_session(&self) -> Option<Result<SessionSummary, SessionError>> {
        let handle = self.slot().take()?;
        match handle.await {
            Ok(result) => Some(result),
            Err(e) => {
                error!("❌ 会话任务异常退出: {}", e);
                None
            }
        }
    }
}
