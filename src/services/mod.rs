//! 业务能力层（Services）
//!
//! 每个服务只描述“我能对页面做什么”，不关心处理顺序：
//!
//! - `catalog` - 扫描列表页，生成职位目录
//! - `identity` - 确认详情页显示的是目标职位
//! - `applied_probe` - 判断职位是否已申请
//! - `affordance` - 查找申请入口
//! - `field_filler` - 按用户资料填写表单字段
//! - `verification` - 提交后确认申请成功
//! - `rate_limit` - 限流检测
//! - `manual_pause` - 人工介入闸门
//! - `pacing` - 可中断的等待、单项截止时间
//! - `notifier` - 向控制端推送事件

pub mod affordance;
pub mod applied_probe;
pub mod catalog;
pub mod field_filler;
pub mod identity;
pub mod manual_pause;
pub mod notifier;
pub mod pacing;
pub mod rate_limit;
pub mod verification;

pub use affordance::AffordanceLocator;
pub use applied_probe::AppliedProbe;
pub use catalog::{AttemptLedger, Catalog, WorkCatalog};
pub use field_filler::{apply_fills, has_unanswered_required, plan_fills, FieldCategory};
pub use identity::IdentityCheck;
pub use manual_pause::{PauseDecision, PauseGate, PauseResolution};
pub use notifier::{ControlEvent, NoticeLevel, Notifier};
pub use pacing::{ItemDeadline, Pacer, RunSignal, Stopped};
pub use rate_limit::RateLimitSentinel;
pub use verification::{SuccessSignal, Verification, Verifier};
