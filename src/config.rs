use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// 程序配置（进程级，来自环境变量）
#[derive(Clone, Debug)]
pub struct Config {
    /// 浏览器调试端口
    pub browser_debug_port: u16,
    /// 职位列表页URL
    pub target_url: String,
    /// 是否自行启动无头浏览器（否则连接已有浏览器）
    pub headless: bool,
    /// 浏览器可执行文件路径（为空时由 chromiumoxide 自动查找）
    pub chrome_executable: Option<String>,
    /// 持久化存储文件
    pub store_path: String,
    /// 用户资料 TOML 文件
    pub profile_file: Option<String>,
    /// 运行设置 TOML 文件
    pub settings_file: Option<String>,
    /// 选择器表 TOML 文件
    pub selectors_file: Option<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            browser_debug_port: 9222,
            target_url: "https://www.linkedin.com/jobs/search/?f_AL=true".to_string(),
            headless: false,
            chrome_executable: None,
            store_path: "auto_apply_store.json".to_string(),
            profile_file: None,
            settings_file: None,
            selectors_file: None,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

/// 读取并解析环境变量，解析失败时保留默认值
fn env_or<T: FromStr>(var_name: &str, default: T, expected_type: &str) -> T {
    match std::env::var(var_name) {
        Ok(value) => match value.trim().parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                let err = ConfigError::EnvVarParseFailed {
                    var_name: var_name.to_string(),
                    value,
                    expected_type: expected_type.to_string(),
                };
                warn!("⚠️ {}，使用默认值", err);
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            browser_debug_port: env_or("BROWSER_DEBUG_PORT", default.browser_debug_port, "u16"),
            target_url: std::env::var("TARGET_URL").unwrap_or(default.target_url),
            headless: env_or("HEADLESS", default.headless, "bool"),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().or(default.chrome_executable),
            store_path: std::env::var("STORE_PATH").unwrap_or(default.store_path),
            profile_file: std::env::var("PROFILE_FILE").ok().or(default.profile_file),
            settings_file: std::env::var("SETTINGS_FILE").ok().or(default.settings_file),
            selectors_file: std::env::var("SELECTORS_FILE").ok().or(default.selectors_file),
            verbose_logging: env_or("VERBOSE_LOGGING", default.verbose_logging, "bool"),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }
}

/// 无法确认提交结果时的处理策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnverifiedPolicy {
    /// 表单已关闭但没有任何正面信号时，按成功处理
    #[default]
    AssumeApplied,
    /// 没有正面信号一律按失败处理
    TreatAsFailed,
}

/// 运行设置（每次 start 时下发，可在运行中更新）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// 拟人化随机延迟下限（毫秒）
    pub delay_min_ms: u64,
    /// 拟人化随机延迟上限（毫秒）
    pub delay_max_ms: u64,
    /// 单个职位的处理时限（秒），人工介入期间暂停计时
    pub per_item_timeout_secs: u64,
    /// 两个职位之间的冷却时间（秒），可跳过
    pub cooldown_secs: u64,
    /// 人工介入等待时间（秒）
    pub manual_pause_secs: u64,
    /// 每个职位的最大尝试次数
    pub max_attempts: u32,
    /// 每处理多少个职位重新扫描一次列表
    pub rescan_every: usize,
    /// 表单状态机最大轮次
    pub form_max_iterations: u32,
    /// 提交结果确认时限（毫秒）
    pub verify_timeout_ms: u64,
    /// 提交结果轮询间隔（毫秒）
    pub verify_interval_ms: u64,
    /// 出现“完成”类按钮后等待表单关闭的时间（秒）
    pub done_wait_secs: u64,
    /// 等待详情页显示目标职位的时间（毫秒）
    pub identity_timeout_ms: u64,
    /// 无法确认提交结果时的处理策略
    pub unverified_policy: UnverifiedPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delay_min_ms: 5000,
            delay_max_ms: 12000,
            per_item_timeout_secs: 60,
            cooldown_secs: 10,
            manual_pause_secs: 300,
            max_attempts: 3,
            rescan_every: 5,
            form_max_iterations: 25,
            verify_timeout_ms: 15000,
            verify_interval_ms: 400,
            done_wait_secs: 10,
            identity_timeout_ms: 5000,
            unverified_policy: UnverifiedPolicy::AssumeApplied,
        }
    }
}

impl Settings {
    /// 修正不合理的取值（上下限颠倒、零值）
    pub fn normalized(mut self) -> Self {
        if self.delay_min_ms > self.delay_max_ms {
            std::mem::swap(&mut self.delay_min_ms, &mut self.delay_max_ms);
        }
        self.max_attempts = self.max_attempts.max(1);
        self.rescan_every = self.rescan_every.max(1);
        self.form_max_iterations = self.form_max_iterations.max(1);
        self.verify_interval_ms = self.verify_interval_ms.max(50);
        self
    }

    pub fn per_item_timeout(&self) -> Duration {
        Duration::from_secs(self.per_item_timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn manual_pause(&self) -> Duration {
        Duration::from_secs(self.manual_pause_secs)
    }

    pub fn done_wait(&self) -> Duration {
        Duration::from_secs(self.done_wait_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_timeout_ms)
    }

    pub fn verify_interval(&self) -> Duration {
        Duration::from_millis(self.verify_interval_ms)
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_timeout_ms)
    }
}
