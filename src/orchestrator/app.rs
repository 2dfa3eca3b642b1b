//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：日志文件、连接（或启动）浏览器、打开存储、加载资料 / 设置 / 选择器
//! 2. **资源管理**：唯一持有 Browser 的模块，生命周期覆盖整个会话
//! 3. **命令行控制端**：把标准输入的命令和 Ctrl+C 转成控制命令
//! 4. **全局统计**：会话结束后输出累计计数和最近的申请记录

use crate::browser;
use crate::config::Config;
use crate::infrastructure::{CdpSurface, JsExecutor};
use crate::models::{load_profile, load_selectors, load_settings};
use crate::orchestrator::context::EngineContext;
use crate::orchestrator::controller::{ControlCommand, Controller};
use crate::orchestrator::scheduler::SessionEnd;
use crate::services::{ControlEvent, NoticeLevel};
use crate::store::{JsonFileStore, Records};
use crate::surface::SelectorSet;
use crate::utils::logging::{
    append_log_line, init_log_file, log_commands_help, log_startup, print_final_stats,
};
use anyhow::{Context, Result};
use chromiumoxide::Browser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

/// 结束时输出的最近记录条数
const RECENT_HISTORY: usize = 10;

/// 命令行输入
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(ControlCommand),
    Status,
    Quit,
}

/// 解析一行命令行输入
///
/// 支持简写（`stop` / `pause` / ...）和完整的 JSON 命令（`{"action": "skip"}`）。
pub fn parse_console_line(line: &str) -> Option<ConsoleInput> {
    let line = line.trim();
    if line.starts_with('{') {
        return match serde_json::from_str::<ControlCommand>(line) {
            Ok(command) => Some(ConsoleInput::Command(command)),
            Err(e) => {
                warn!("⚠️ 无法解析命令 {}: {}", line, e);
                None
            }
        };
    }
    let command = match line.to_lowercase().as_str() {
        "start" => ControlCommand::Start {
            profile: None,
            settings: None,
        },
        "stop" => ControlCommand::Stop,
        "pause" => ControlCommand::Pause,
        "resume" => ControlCommand::Resume,
        "skip" => ControlCommand::Skip,
        "reset" => ControlCommand::Reset,
        "status" => return Some(ConsoleInput::Status),
        "quit" | "exit" => return Some(ConsoleInput::Quit),
        "" => return None,
        other => {
            warn!("⚠️ 未知命令: {}", other);
            return None;
        }
    };
    Some(ConsoleInput::Command(command))
}

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    controller: Arc<Controller<CdpSurface>>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        // 连接浏览器
        let (browser, page) = if config.headless {
            browser::launch_headless_browser(&config.target_url, config.chrome_executable.as_deref())
                .await?
        } else {
            browser::connect_to_browser_and_page(
                config.browser_debug_port,
                Some(&config.target_url),
                None,
            )
            .await?
        };

        // CdpSurface 持有唯一的 JsExecutor
        let surface = Arc::new(CdpSurface::new(JsExecutor::new(page)));

        let store = JsonFileStore::open(&config.store_path)
            .await
            .with_context(|| format!("无法打开存储文件: {}", config.store_path))?;
        let records = Records::new(Arc::new(store));

        let selectors = match &config.selectors_file {
            Some(path) => load_selectors(Path::new(path)).await?,
            None => SelectorSet::default(),
        };

        let settings = match &config.settings_file {
            Some(path) => {
                let settings = load_settings(Path::new(path)).await?;
                records.save_settings(&settings).await?;
                settings
            }
            None => records.settings().await?.unwrap_or_default(),
        };

        if let Some(path) = &config.profile_file {
            let profile = load_profile(Path::new(path)).await?;
            records.save_profile(&profile).await?;
        }

        let ctx = Arc::new(EngineContext::new(surface, selectors, records, settings)?);
        let controller = Arc::new(Controller::new(ctx));

        Ok(Self {
            config,
            _browser: browser,
            controller,
        })
    }

    pub fn controller(&self) -> &Arc<Controller<CdpSurface>> {
        &self.controller
    }

    /// 运行应用主逻辑
    ///
    /// 会话自然结束（处理完 / 限流 / stop）时返回；`pause` 之后等待 `start` 继续。
    pub async fn run(&self) -> Result<()> {
        log_commands_help();

        let mut events = self.controller.events();
        self.controller
            .handle(ControlCommand::Start {
                profile: None,
                settings: None,
            })
            .await;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut paused = false;

        loop {
            tokio::select! {
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => match parse_console_line(&line) {
                        Some(ConsoleInput::Command(command)) => {
                            match &command {
                                ControlCommand::Pause => paused = true,
                                ControlCommand::Start { .. } | ControlCommand::Stop => paused = false,
                                _ => {}
                            }
                            let ack = self.controller.handle(command).await;
                            info!("✓ {:?}", ack);
                        }
                        Some(ConsoleInput::Status) => self.log_status().await,
                        Some(ConsoleInput::Quit) => {
                            self.controller.handle(ControlCommand::Stop).await;
                            break;
                        }
                        None => {}
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("⚠️ 读取标准输入失败: {}", e);
                        stdin_open = false;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("收到 Ctrl+C，正在停止...");
                    self.controller.handle(ControlCommand::Stop).await;
                    break;
                }
                event = events.recv() => match event {
                    Ok(event) => {
                        self.log_event(&event);
                        if matches!(event, ControlEvent::StatsUpdated { is_running: false, .. }) && !paused {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => warn!("⚠️ 丢失了 {} 条事件", n),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        match self.controller.wait_session().await {
            Some(Ok(summary)) => {
                let end = match summary.end {
                    SessionEnd::Completed => "全部处理完成",
                    SessionEnd::Stopped => "已停止",
                };
                info!(
                    "🏁 会话结束（{}）: {} 页, {} 个职位",
                    end, summary.pages, summary.processed
                );
            }
            Some(Err(e)) => error!("❌ 会话异常结束: {}", e),
            None => {}
        }

        let records = &self.controller.context().records;
        let counters = records.counters().await?;
        let history = records.history().await?;
        let recent = &history[..history.len().min(RECENT_HISTORY)];
        print_final_stats(&counters, recent, &self.config.output_log_file);

        Ok(())
    }

    async fn log_status(&self) {
        match self.controller.context().records.counters().await {
            Ok(counters) => info!(
                "📊 运行中: {} | 已申请 {} / 已跳过 {} / 失败 {}",
                self.controller.is_running(),
                counters.applied,
                counters.skipped,
                counters.failed
            ),
            Err(e) => warn!("⚠️ 读取计数失败: {}", e),
        }
    }

    /// 输出事件，并把需要留档的事件写入日志文件
    fn log_event(&self, event: &ControlEvent) {
        let line = match event {
            ControlEvent::Notice { level, message } => {
                match level {
                    NoticeLevel::Error => error!("📢 {}", message),
                    _ => info!("📢 {}", message),
                }
                message.clone()
            }
            ControlEvent::ManualPauseRequested { seconds, reason } => {
                warn!(
                    "✋ 需要人工处理（{}），请在 {} 秒内完成后输入 resume，或输入 skip 跳过",
                    reason, seconds
                );
                format!("人工介入: {}", reason)
            }
            ControlEvent::RateLimitReached => {
                error!("🛑 平台限流，会话已停止，请稍后再试");
                "平台限流".to_string()
            }
            _ => return,
        };
        if let Err(e) = append_log_line(&self.config.output_log_file, &line) {
            warn!("⚠️ 写入日志文件失败: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand_commands() {
        assert_eq!(
            parse_console_line(" Skip "),
            Some(ConsoleInput::Command(ControlCommand::Skip))
        );
        assert_eq!(
            parse_console_line("pause"),
            Some(ConsoleInput::Command(ControlCommand::Pause))
        );
        assert_eq!(parse_console_line("status"), Some(ConsoleInput::Status));
        assert_eq!(parse_console_line("exit"), Some(ConsoleInput::Quit));
        assert_eq!(parse_console_line(""), None);
        assert_eq!(parse_console_line("apply harder"), None);
    }

    #[test]
    fn test_parse_json_commands() {
        assert_eq!(
            parse_console_line(r#"{"action": "resume"}"#),
            Some(ConsoleInput::Command(ControlCommand::Resume))
        );
        match parse_console_line(r#"{"action": "updateSettings", "settings": {"cooldownSecs": 3}}"#) {
            Some(ConsoleInput::Command(ControlCommand::UpdateSettings { settings })) => {
                assert_eq!(settings.cooldown_secs, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(parse_console_line(r#"{"action": "fly"}"#), None);
    }
}
