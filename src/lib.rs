//! # Auto Apply
//!
//! 一个在职位列表页上自动完成"快速申请"的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//! - `CdpSurface` - `PageSurface` 的生产实现
//! - `store/` - 键值存储（JSON 文件 / 内存）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个职位或单个表单步骤
//! - `Catalog` - 扫描列表页，生成职位目录
//! - `Verifier` - 提交后确认申请成功
//! - `RateLimitSentinel` - 限流检测
//! - `PauseGate` - 人工介入闸门
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个申请表单"的完整处理流程
//! - `FormSession` - 单个表单的上下文（已填字段、轮次）
//! - `ApplyFlow` - 表单状态机（填写 → 下一步 → 审核 → 提交 → 确认）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/scheduler` - 会话调度器，逐个处理职位
//! - `orchestrator/controller` - 控制协议（start / stop / pause / resume / skip）
//! - `orchestrator/app` - 应用入口，管理浏览器资源和命令行
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod store;
pub mod surface;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use config::{Config, Settings};
pub use error::{AppError, AppResult, ItemError, SessionError};
pub use infrastructure::{CdpSurface, JsExecutor};
pub use models::{HistoryEntry, HistoryStatus, ProfileData, WorkItem};
pub use orchestrator::{App, ControlCommand, Controller, Scheduler};
pub use surface::{PageSurface, SelectorSet};
pub use workflow::{ApplyFlow, FormSession};
