//! 错误类型定义
//!
//! - `AppError`：基础设施错误（浏览器 / 页面操作 / 存储 / 配置）
//! - `ItemError`：单个职位处理中的错误，全部在调度器边界被转换为终态和历史记录
//! - `SessionError`：会话级错误，其中只有限流会终止整个会话

use crate::models::HistoryStatus;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 页面操作错误
    #[error("页面操作错误: {0}")]
    Surface(#[from] SurfaceError),
    /// 存储错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    LaunchFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 浏览器配置失败
    #[error("浏览器配置失败: {0}")]
    ConfigurationFailed(String),
}

/// 页面操作错误（Page Surface 层）
#[derive(Debug, Error)]
pub enum SurfaceError {
    /// 执行脚本失败
    #[error("执行脚本失败: {source}")]
    ScriptFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 元素已从页面上消失
    #[error("元素已失效: {0}")]
    StaleElement(String),
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 页面返回的数据无法解析
    #[error("页面返回数据无法解析: {0}")]
    Decode(#[from] serde_json::Error),
}

/// 存储错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 读取存储文件失败
    #[error("读取存储文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入存储文件失败
    #[error("写入存储文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 存储内容格式错误
    #[error("存储数据格式错误: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// 单个职位处理过程中的错误
///
/// 这些错误都不会逃出调度器：调度器把它们转换为职位终态和一条历史记录。
#[derive(Debug, Error)]
pub enum ItemError {
    /// 详情页上没有申请入口
    #[error("未找到申请入口")]
    NoTarget,
    /// 必需的控件在等待时间内没有出现
    #[error("等待 {what} 超时 ({waited_ms}ms)")]
    ElementTimeout { what: &'static str, waited_ms: u64 },
    /// 详情页连续加载了错误的职位
    #[error("详情页加载了错误的职位: 期望 {expected}, 实际 {found}")]
    IdentityMismatch { expected: String, found: String },
    /// 详情页没有在等待时间内显示目标职位
    #[error("详情页未能在 {waited_ms}ms 内确认职位 {expected}")]
    LoadTimeout { expected: String, waited_ms: u64 },
    /// 同一职位尝试次数已用完
    #[error("职位 {id} 已达到最大尝试次数 {max}")]
    AttemptLimitExceeded { id: String, max: u32 },
    /// 人工介入超时
    #[error("人工介入超时")]
    ManualPauseTimeout,
    /// 人工介入被取消
    #[error("人工介入被取消")]
    ManualPauseCancelled,
    /// 检测到平台限流（会话级致命）
    #[error("检测到平台限流")]
    RateLimitDetected,
    /// 表单在最大轮次内未能完成
    #[error("表单在 {iterations} 轮内未能完成")]
    FormConvergence { iterations: u32 },
    /// 单项处理超时
    #[error("单项处理超时 ({seconds}s)")]
    Deadline { seconds: u64 },
    /// 运行被外部停止
    #[error("运行已停止")]
    Interrupted,
    /// 页面操作失败（可重试）
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

impl ItemError {
    /// 该错误对应的历史记录状态
    pub fn history_status(&self) -> HistoryStatus {
        match self {
            ItemError::NoTarget => HistoryStatus::SkippedNoEasyApply,
            ItemError::ElementTimeout { .. } => HistoryStatus::SkippedModalFailed,
            ItemError::IdentityMismatch { .. } | ItemError::LoadTimeout { .. } => {
                HistoryStatus::SkippedLoadFailed
            }
            ItemError::AttemptLimitExceeded { .. } => HistoryStatus::SkippedMaxAttempts,
            ItemError::ManualPauseTimeout | ItemError::ManualPauseCancelled => {
                HistoryStatus::Skipped
            }
            ItemError::RateLimitDetected | ItemError::Interrupted => HistoryStatus::Stopped,
            ItemError::FormConvergence { .. } | ItemError::Surface(_) => HistoryStatus::Failed,
            ItemError::Deadline { .. } => HistoryStatus::SkippedTimeout,
        }
    }

    /// 页面操作失败可以在下一次尝试中重试，其余错误都是终态
    pub fn is_retryable(&self) -> bool {
        matches!(self, ItemError::Surface(_))
    }

    /// 只有限流会终止整个会话
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ItemError::RateLimitDetected)
    }
}

impl From<crate::services::pacing::Stopped> for ItemError {
    fn from(_: crate::services::pacing::Stopped) -> Self {
        ItemError::Interrupted
    }
}

/// 会话级错误
#[derive(Debug, Error)]
pub enum SessionError {
    /// 启动时页面上没有可处理的职位
    #[error("当前页面没有找到可处理的职位")]
    NoWorkItemsFound,
    /// 平台限流，整个会话停止且不会自动恢复
    #[error("检测到平台限流，会话已停止")]
    RateLimitDetected,
    /// 首次扫描页面失败
    #[error("扫描页面失败: {0}")]
    Surface(#[from] SurfaceError),
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for SurfaceError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        SurfaceError::ScriptFailed {
            source: Box::new(err),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Surface(err.into())
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            port,
            source: Box::new(source),
        })
    }

    /// 创建配置文件读取错误
    pub fn config_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Config(ConfigError::FileReadFailed {
            path: path.into(),
            source,
        })
    }
}

impl SurfaceError {
    /// 包装任意脚本执行错误
    pub fn script(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        SurfaceError::ScriptFailed {
            source: Box::new(source),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 页面操作结果类型
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// 存储操作结果类型
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_errors_map_to_history_reasons() {
        assert_eq!(
            ItemError::NoTarget.history_status(),
            HistoryStatus::SkippedNoEasyApply
        );
        assert_eq!(
            ItemError::IdentityMismatch {
                expected: "11111".into(),
                found: "22222".into()
            }
            .history_status(),
            HistoryStatus::SkippedLoadFailed
        );
        assert_eq!(
            ItemError::FormConvergence { iterations: 25 }.history_status(),
            HistoryStatus::Failed
        );
        assert_eq!(
            ItemError::Deadline { seconds: 60 }.history_status(),
            HistoryStatus::SkippedTimeout
        );
    }

    #[test]
    fn test_only_rate_limit_is_session_fatal() {
        assert!(ItemError::RateLimitDetected.is_session_fatal());
        assert!(!ItemError::ManualPauseTimeout.is_session_fatal());
        assert!(!ItemError::FormConvergence { iterations: 25 }.is_session_fatal());
    }

    #[test]
    fn test_surface_errors_are_retryable() {
        assert!(ItemError::Surface(SurfaceError::StaleElement("n1".into())).is_retryable());
        assert!(!ItemError::NoTarget.is_retryable());
    }
}
