//! 基础设施层（Infrastructure）
//!
//! ## 职责
//!
//! 持有稀缺资源（Page），只暴露能力，不认识任何业务概念。
//!
//! - `JsExecutor` - 唯一的 page owner，提供 eval() / 导航能力
//! - `CdpSurface` - 在 `JsExecutor` 之上实现 `PageSurface`

pub mod cdp_surface;
pub mod js_executor;

pub use cdp_surface::CdpSurface;
pub use js_executor::JsExecutor;
