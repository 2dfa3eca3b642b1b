//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责会话调度和外部控制，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行、清理）
//! - 管理浏览器资源（Browser、CdpSurface）
//! - 命令行控制端，输出全局统计信息
//!
//! ### `controller` - 控制器
//! - 接收 start / stop / pause / resume / skip / updateSettings / reset
//! - 同一时刻最多一个会话
//!
//! ### `scheduler` - 会话调度器
//! - 逐个处理职位目录（Vec<WorkItem>），翻页、定期重新扫描
//! - 单项时限、尝试次数、冷却
//! - 把每个职位的结果转换为终态、计数和历史记录
//!
//! ### `context` - 引擎上下文
//! - 调度器和控制器共享的页面、存储、信号、闸门和能力服务
//!
//! ## 层次关系
//!
//! ```text
//! app (命令行 / Ctrl+C)
//!     ↓
//! controller (处理命令，启动会话)
//!     ↓
//! scheduler (处理 Vec<WorkItem>)
//!     ↓
//! workflow::ApplyFlow (处理单个申请表单)
//!     ↓
//! services (能力层：catalog / verification / rate_limit / manual_pause ...)
//!     ↓
//! infrastructure (基础设施：JsExecutor / CdpSurface)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：scheduler 管会话，ApplyFlow 管单个表单
//! 2. **资源隔离**：只有编排层持有 Browser
//! 3. **向下依赖**：编排层 → workflow → services → surface
//! 4. **错误不外逃**：单个职位的错误都在调度器里变成终态，只有限流终止会话

pub mod app;
pub mod context;
pub mod controller;
pub mod scheduler;

// 重新导出主要类型
pub use app::{parse_console_line, App, ConsoleInput};
pub use context::{Cooldown, EngineContext};
pub use controller::{Ack, ControlCommand, Controller};
pub use scheduler::{Scheduler, SessionEnd, SessionState, SessionSummary};
